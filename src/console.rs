//! Interactive console prompts used by the binaries
//!
//! Every prompt reads from any `BufRead` and writes to any `Write`, so the
//! binaries pass stdin/stdout and the tests pass buffers.

use std::io::{self, BufRead, Write};

use crate::network::discovery::DiscoveredSource;
use crate::video::device::CameraInfo;

const RULE_WIDTH: usize = 60;

/// Title between two rules
pub fn print_banner<W: Write>(out: &mut W, title: &str) -> io::Result<()> {
    writeln!(out, "{}", "=".repeat(RULE_WIDTH))?;
    writeln!(out, "{}", title)?;
    writeln!(out, "{}", "=".repeat(RULE_WIDTH))
}

/// Print `label` and read one trimmed line; `None` at end of input
pub fn prompt<R: BufRead, W: Write>(input: &mut R, out: &mut W, label: &str) -> io::Result<Option<String>> {
    write!(out, "{}", label)?;
    out.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

/// Ask for the camera's unique name
pub fn prompt_camera_name<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> io::Result<Option<String>> {
    let name = prompt(input, out, "\nEnter unique camera name (e.g., CAM_A, CAM_B): ")?;
    match name {
        Some(name) if !name.is_empty() => Ok(Some(name)),
        _ => {
            writeln!(out, "Camera name cannot be empty!")?;
            Ok(None)
        }
    }
}

/// List cameras and let the operator pick one
///
/// A single camera is chosen without asking. Invalid answers are asked
/// again; end of input gives `None`.
pub fn select_camera<R: BufRead, W: Write>(input: &mut R, out: &mut W, cameras: &[CameraInfo]) -> io::Result<Option<u32>> {
    if cameras.is_empty() {
        writeln!(out, "No cameras detected!")?;
        return Ok(None);
    }

    writeln!(out, "\n{}", "=".repeat(RULE_WIDTH))?;
    writeln!(out, "Available cameras:")?;
    writeln!(out, "{}", "=".repeat(RULE_WIDTH))?;
    for camera in cameras {
        writeln!(
            out,
            "  [{}] {} - {}x{} @ {}fps",
            camera.id, camera.name, camera.width, camera.height, camera.fps
        )?;
    }
    writeln!(out, "{}", "=".repeat(RULE_WIDTH))?;

    if let [only] = cameras {
        writeln!(out, "\nUsing camera {}", only.id)?;
        return Ok(Some(only.id));
    }

    let ids: Vec<u32> = cameras.iter().map(|c| c.id).collect();
    loop {
        let Some(answer) = prompt(input, out, &format!("\nSelect camera ID {:?}: ", ids))? else {
            return Ok(None);
        };
        match answer.parse::<u32>() {
            Ok(id) if ids.contains(&id) => return Ok(Some(id)),
            Ok(_) => writeln!(out, "Invalid camera ID")?,
            Err(_) => writeln!(out, "Please enter a number")?,
        }
    }
}

/// Read source names, one per line, until an empty line
///
/// Sources already discovered on the network are listed first. Repeated
/// names are ignored.
pub fn prompt_source_names<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    discovered: &[DiscoveredSource],
) -> io::Result<Vec<String>> {
    if discovered.is_empty() {
        writeln!(out, "\nNo sources announced yet.")?;
    } else {
        writeln!(out, "\nSources on the network:")?;
        for source in discovered {
            writeln!(out, "  {} ({})", source.name, source.addr)?;
        }
    }

    writeln!(out, "\nEnter source names (camera names from transmitters)")?;
    writeln!(out, "Enter one per line, empty line when done:")?;

    let mut names: Vec<String> = Vec::new();
    loop {
        let label = format!("Source {}: ", names.len() + 1);
        let Some(name) = prompt(input, out, &label)? else {
            break;
        };
        if name.is_empty() {
            break;
        }
        if names.contains(&name) {
            writeln!(out, "'{}' already added", name)?;
            continue;
        }
        names.push(name);
    }

    if names.is_empty() {
        writeln!(out, "No sources specified!")?;
    }
    Ok(names)
}

/// Summary printed after a camera is chosen
pub fn print_selection<W: Write>(out: &mut W, camera: &CameraInfo, name: &str, target: (u32, u32, u32)) -> io::Result<()> {
    writeln!(out, "\nSelected: Camera {}", camera.id)?;
    writeln!(out, "  Name: {}", name)?;
    writeln!(out, "  Current resolution: {}x{}", camera.width, camera.height)?;
    writeln!(out, "  Current FPS: {}", camera.fps)?;
    writeln!(out, "  Will configure to: {}x{} @ {}fps", target.0, target.1, target.2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn camera(id: u32) -> CameraInfo {
        CameraInfo {
            id,
            name: format!("Camera {}", id),
            width: 1280,
            height: 720,
            fps: 30,
        }
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut out = Vec::new();
        assert_eq!(prompt_camera_name(&mut Cursor::new("  \n"), &mut out).unwrap(), None);
        assert_eq!(
            prompt_camera_name(&mut Cursor::new("CAM_A\n"), &mut out).unwrap(),
            Some("CAM_A".to_string())
        );
    }

    #[test]
    fn test_single_camera_auto_selected() {
        let mut out = Vec::new();
        let id = select_camera(&mut Cursor::new(""), &mut out, &[camera(2)]).unwrap();
        assert_eq!(id, Some(2));
    }

    #[test]
    fn test_camera_selection_retries() {
        let mut out = Vec::new();
        let cameras = [camera(0), camera(1)];
        let id = select_camera(&mut Cursor::new("abc\n7\n1\n"), &mut out, &cameras).unwrap();
        assert_eq!(id, Some(1));

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Please enter a number"));
        assert!(text.contains("Invalid camera ID"));
    }

    #[test]
    fn test_selection_eof() {
        let mut out = Vec::new();
        let cameras = [camera(0), camera(1)];
        assert_eq!(select_camera(&mut Cursor::new(""), &mut out, &cameras).unwrap(), None);
        assert_eq!(select_camera(&mut Cursor::new(""), &mut out, &[]).unwrap(), None);
    }

    #[test]
    fn test_source_names_until_blank() {
        let mut out = Vec::new();
        let names = prompt_source_names(&mut Cursor::new("CAM_A\nCAM_B\nCAM_A\n\nignored\n"), &mut out, &[]).unwrap();
        assert_eq!(names, vec!["CAM_A", "CAM_B"]);
        assert!(String::from_utf8(out).unwrap().contains("already added"));
    }
}
