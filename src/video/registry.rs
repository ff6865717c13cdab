//! Ordered set of connected sources

use std::time::Duration;

use crate::error::SourceError;
use crate::video::source::FrameSource;

/// Sources in connection order
///
/// Built once at startup; sources that fail to connect are left out.
#[derive(Default)]
pub struct SourceRegistry {
    sources: Vec<FrameSource>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }
    
    /// Connect and start every named source, skipping failures
    pub fn connect_all<F>(names: &[String], mut connect: F) -> Self
    where
        F: FnMut(&str) -> Result<FrameSource, SourceError>,
    {
        let mut registry = Self::new();
        
        for name in names {
            let result = connect(name).and_then(|mut source| {
                source.start()?;
                Ok(source)
            });
            
            match result {
                Ok(source) => match registry.insert(source) {
                    Ok(()) => tracing::info!("✓ Connected to {}", name),
                    Err(e) => tracing::warn!("✗ {}", e),
                },
                Err(e) => tracing::warn!("✗ Failed to connect to {}: {}", name, e),
            }
        }
        
        registry
    }
    
    /// Add a source; names must be unique
    pub fn insert(&mut self, source: FrameSource) -> Result<(), SourceError> {
        if self.get(source.name()).is_some() {
            return Err(SourceError::Duplicate(source.name().to_string()));
        }
        self.sources.push(source);
        Ok(())
    }
    
    pub fn get(&self, name: &str) -> Option<&FrameSource> {
        self.sources.iter().find(|s| s.name() == name)
    }
    
    pub fn iter(&self) -> impl Iterator<Item = &FrameSource> {
        self.sources.iter()
    }
    
    pub fn names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }
    
    pub fn len(&self) -> usize {
        self.sources.len()
    }
    
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
    
    /// Stop every source, each with its own bounded join
    pub fn stop_all(&mut self, timeout: Duration) {
        for source in &mut self.sources {
            if !source.stop(timeout) {
                tracing::warn!("Source '{}' did not stop cleanly", source.name());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::device::TestPatternGrabber;
    use crate::video::frame::Color;
    
    fn pattern_source(name: &str) -> FrameSource {
        FrameSource::new(
            name,
            Box::new(TestPatternGrabber::solid(8, 8, 30, Color::RED)),
            Duration::from_millis(20),
        )
    }
    
    #[test]
    fn test_failed_connections_are_omitted() {
        let names: Vec<String> = ["CAM_A", "MISSING", "CAM_B"].iter().map(|s| s.to_string()).collect();
        let mut registry = SourceRegistry::connect_all(&names, |name| {
            if name == "MISSING" {
                Err(SourceError::NotFound(name.to_string()))
            } else {
                Ok(pattern_source(name))
            }
        });
        
        assert_eq!(registry.names(), vec!["CAM_A".to_string(), "CAM_B".to_string()]);
        assert!(registry.get("MISSING").is_none());
        registry.stop_all(Duration::from_secs(1));
    }
    
    #[test]
    fn test_duplicate_names_rejected() {
        let mut registry = SourceRegistry::new();
        registry.insert(pattern_source("CAM_A")).unwrap();
        assert!(matches!(
            registry.insert(pattern_source("CAM_A")),
            Err(SourceError::Duplicate(name)) if name == "CAM_A"
        ));
        assert_eq!(registry.len(), 1);
    }
}
