//! Placeholder FASTA records for regions whose consensus job produced nothing.

use std::io::{self, Read, Write};

use crate::region::Region;

/// Errors for an unusable filler symbol.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FillerError {
    #[error("filler symbol must be exactly one character, got {0:?}")]
    NotSingleChar(String),

    #[error("filler symbol {0:?} is not a printable ASCII sequence character")]
    Unprintable(char),

    #[error("filler symbol '>' would be read as a FASTA header")]
    HeaderMarker,

    #[error("placeholder for {id} spans {span} bases, too many to hold in memory")]
    SpanTooLarge { id: String, span: u64 },
}

/// Check that `symbol` can stand in for sequence in a FASTA record.
pub fn validate_filler_symbol(symbol: &str) -> Result<char, FillerError> {
    let mut chars = symbol.chars();
    let c = match (chars.next(), chars.next()) {
        (Some(c), None) => c,
        _ => return Err(FillerError::NotSingleChar(symbol.to_string())),
    };

    if c == '>' {
        return Err(FillerError::HeaderMarker);
    }
    if !c.is_ascii_graphic() {
        return Err(FillerError::Unprintable(c));
    }
    Ok(c)
}

/// Stream the placeholder record for `region` into `out`: a `>` header
/// carrying the identifier verbatim, then one line of `symbol` repeated
/// `span` times.
pub fn write_placeholder<W: Write>(out: &mut W, region: &Region, symbol: char) -> io::Result<()> {
    write!(out, ">{}\n", region.id())?;

    let mut buf = [0u8; 4];
    let encoded = symbol.encode_utf8(&mut buf).as_bytes();
    if let [byte] = encoded {
        io::copy(&mut io::repeat(*byte).take(region.span()), out)?;
    } else {
        for _ in 0..region.span() {
            out.write_all(encoded)?;
        }
    }

    out.write_all(b"\n")
}

/// Render the placeholder record for `region` as a string.
///
/// Fails instead of allocating when the record cannot fit in memory; use
/// [`write_placeholder`] to stream records of any length.
pub fn placeholder_record(region: &Region, symbol: char) -> Result<String, FillerError> {
    let too_large = || FillerError::SpanTooLarge {
        id: region.id().to_string(),
        span: region.span(),
    };
    let len = usize::try_from(region.span())
        .ok()
        .and_then(|span| span.checked_mul(symbol.len_utf8()))
        .and_then(|seq| seq.checked_add(region.id().len() + 2))
        .filter(|&len| len <= isize::MAX as usize)
        .ok_or_else(too_large)?;

    let mut record = Vec::with_capacity(len);
    write_placeholder(&mut record, region, symbol).map_err(|_| too_large())?;
    String::from_utf8(record).map_err(|_| too_large())
}
