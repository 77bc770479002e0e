//! Terminal rendering of the gateway's login QR payload.

use qrcode::{Color, EcLevel, QrCode};

use crate::error::AppError;

/// Render `data` as a compact QR code using Unicode half blocks.
///
/// Two module rows share one text line (`▀`, `▄`, `█`, space), with a
/// one-module quiet zone so phone cameras lock on against dark terminals.
pub fn render_terminal(data: &str) -> Result<String, AppError> {
    let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::L)
        .map_err(|e| AppError::Comms(format!("QR generation failed: {e}")))?;

    let width = code.width();
    let colors = code.into_colors();
    let is_dark = |row: isize, col: isize| -> bool {
        if row < 0 || col < 0 {
            return false;
        }
        let (row, col) = (row as usize, col as usize);
        row < width && col < width && colors[row * width + col] == Color::Dark
    };

    let size = width as isize;
    let mut out = String::new();
    let mut row = -1;
    while row <= size {
        for col in -1..=size {
            out.push(match (is_dark(row, col), is_dark(row + 1, col)) {
                (true, true) => '█',
                (true, false) => '▀',
                (false, true) => '▄',
                (false, false) => ' ',
            });
        }
        out.push('\n');
        row += 2;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_square_block() {
        let out = render_terminal("2@abc,def,ghi").unwrap();
        let lines: Vec<&str> = out.lines().collect();
        let width = lines[0].chars().count();
        assert!(width >= 23);
        assert!(lines.iter().all(|l| l.chars().count() == width));
        assert_eq!(lines.len(), width.div_ceil(2));
        assert!(out.contains('█') || out.contains('▀'));
    }
}
