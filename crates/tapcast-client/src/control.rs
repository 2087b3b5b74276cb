//! Control-channel coordinate mapping.
//!
//! TOUCH commands carry coordinates normalized to the viewer's rendered
//! surface at send time; the host maps them back onto its own screen
//! resolution before injecting. Out-of-range pointers clamp rather than
//! error, since surfaces and streams resize independently.

use tapcast_common::error::{Error, Result};
use tapcast_common::protocol::ControlCommand;

/// Build a TOUCH command from a pointer position on the rendered surface.
pub fn touch_from_pointer(
    pointer_x: f64,
    pointer_y: f64,
    surface_width: f64,
    surface_height: f64,
) -> Result<ControlCommand> {
    if surface_width <= 0.0 || surface_height <= 0.0 {
        return Err(Error::protocol("render surface has no area"));
    }
    Ok(ControlCommand::Touch {
        x: (pointer_x / surface_width).clamp(0.0, 1.0),
        y: (pointer_y / surface_height).clamp(0.0, 1.0),
    })
}

/// Map a TOUCH command onto absolute screen coordinates.
pub fn touch_to_screen(command: &ControlCommand, screen_width: u32, screen_height: u32) -> (f64, f64) {
    let ControlCommand::Touch { x, y } = command;
    (
        x.clamp(0.0, 1.0) * screen_width as f64,
        y.clamp(0.0, 1.0) * screen_height as f64,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_maps_to_center() {
        let cmd = touch_from_pointer(180.0, 320.0, 360.0, 640.0).unwrap();
        assert_eq!(cmd, ControlCommand::Touch { x: 0.5, y: 0.5 });

        let (x, y) = touch_to_screen(&cmd, 1080, 1920);
        assert_eq!((x, y), (540.0, 960.0));
    }

    #[test]
    fn test_pointer_outside_surface_clamps() {
        let cmd = touch_from_pointer(-20.0, 700.0, 360.0, 640.0).unwrap();
        assert_eq!(cmd, ControlCommand::Touch { x: 0.0, y: 1.0 });
    }

    #[test]
    fn test_degenerate_surface_is_rejected() {
        assert!(touch_from_pointer(1.0, 1.0, 0.0, 640.0).is_err());
        assert!(touch_from_pointer(1.0, 1.0, 360.0, -1.0).is_err());
    }

    #[test]
    fn test_out_of_range_command_clamps_on_injection() {
        let cmd = ControlCommand::Touch { x: 1.5, y: -0.5 };
        let (x, y) = touch_to_screen(&cmd, 1000, 2000);
        assert_eq!((x, y), (1000.0, 0.0));
    }
}
