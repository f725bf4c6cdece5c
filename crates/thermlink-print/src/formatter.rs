// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Payload formatting: turns the text of one receipt into ESC/POS bytes.
//
// Markup dialects (tags, barcodes, images) live behind `MarkupFormatter`.
// `PlainTextFormatter` prints text verbatim and is what the CLI uses.

use encoding_rs::Encoding;
use thermlink_core::error::ThermlinkError;
use thermlink_core::types::CharsetEncoding;
use thiserror::Error;

const ESC: u8 = 0x1B;
const GS: u8 = 0x1D;

/// Why a payload could not be turned into printer bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("invalid formatted text: {0}")]
    Parser(String),

    #[error("unsupported character encoding: {0}")]
    Encoding(String),

    #[error("invalid barcode: {0}")]
    Barcode(String),
}

impl From<FormatError> for ThermlinkError {
    fn from(err: FormatError) -> Self {
        match err {
            FormatError::Parser(msg) => ThermlinkError::Parser(msg),
            FormatError::Encoding(msg) => ThermlinkError::Encoding(msg),
            FormatError::Barcode(msg) => ThermlinkError::Barcode(msg),
        }
    }
}

/// Renders one payload for a printer using the given character table.
pub trait MarkupFormatter: Send + Sync {
    fn format(&self, markup: &str, charset: &CharsetEncoding) -> Result<Vec<u8>, FormatError>;
}

/// Prints text as-is: init, select code page, text, feed, cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlainTextFormatter {
    /// Lines fed after the text so it clears the cutter.
    pub feed_lines: u8,
    pub cut: bool,
}

impl Default for PlainTextFormatter {
    fn default() -> Self {
        Self {
            feed_lines: 3,
            cut: true,
        }
    }
}

impl MarkupFormatter for PlainTextFormatter {
    fn format(&self, markup: &str, charset: &CharsetEncoding) -> Result<Vec<u8>, FormatError> {
        let encoding = Encoding::for_label(charset.name.as_bytes())
            .ok_or_else(|| FormatError::Encoding(format!("unknown charset '{}'", charset.name)))?;

        let text = markup.replace("\r\n", "\n");
        // Raw control bytes would be executed as printer commands.
        if let Some((line, c)) = text
            .lines()
            .enumerate()
            .find_map(|(i, l)| l.chars().find(|c| c.is_control() && *c != '\t').map(|c| (i + 1, c)))
        {
            return Err(FormatError::Parser(format!(
                "control character U+{:04X} on line {line}",
                u32::from(c)
            )));
        }

        let (encoded, _, unmappable) = encoding.encode(&text);
        if unmappable {
            return Err(FormatError::Encoding(format!(
                "text contains characters not representable in {}",
                encoding.name()
            )));
        }

        let mut out = Vec::with_capacity(encoded.len() + 12);
        out.extend_from_slice(&[ESC, b'@']);
        out.extend_from_slice(&[ESC, b't', charset.code_page]);
        out.extend_from_slice(&encoded);
        if !encoded.ends_with(b"\n") {
            out.push(b'\n');
        }
        out.extend_from_slice(&[ESC, b'd', self.feed_lines]);
        if self.cut {
            // Partial cut.
            out.extend_from_slice(&[GS, b'V', 1]);
        }
        Ok(out)
    }
}
