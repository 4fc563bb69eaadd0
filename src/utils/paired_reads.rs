use std::io::{Error as IOError, ErrorKind};

/// Takes a FASTQ header and returns the molecular ID and, when the header
/// records it, the read side.
///
/// Handles the Illumina 1.8+ comment (`@id 1:N:0:ACGT`), the legacy `/1` and
/// `/2` suffixes, and bare names without a side.
pub fn get_molecular_id_side(header: &str) -> (&str, Option<char>) {
    let header = header.strip_prefix('@').unwrap_or(header);
    let mut pieces = header.split_ascii_whitespace();
    let id = pieces.next().unwrap_or_default();

    if let Some(comment) = pieces.next()
        && let Some((field, _)) = comment.split_once(':')
        && let [side @ b'0'..=b'3'] = field.as_bytes()
    {
        return (id, Some(*side as char));
    }

    if let Some((base, suffix)) = id.rsplit_once('/')
        && let [side @ (b'1' | b'2')] = suffix.as_bytes()
    {
        return (base, Some(*side as char));
    }

    (id, None)
}

/// Whether two headers plausibly describe the first and second read of one
/// molecule.
pub fn are_mates(header1: &str, header2: &str) -> bool {
    let (id1, side1) = get_molecular_id_side(header1);
    let (id2, side2) = get_molecular_id_side(header2);

    id1 == id2 && side1 != Some('2') && side2 != Some('1')
}

/// Checks whether the leading headers of a single file alternate between
/// mates. An odd number of headers, or fewer than two, is never interleaved.
pub fn looks_interleaved<S: AsRef<str>>(headers: &[S]) -> bool {
    headers.len() >= 2
        && headers.len() % 2 == 0
        && headers
            .chunks_exact(2)
            .all(|pair| are_mates(pair[0].as_ref(), pair[1].as_ref()))
}

/// Returns whether two reads from separate files have matching molecular
/// IDs. Errors if the read IDs don't match.
pub fn check_paired_headers(header1: &str, header2: &str) -> Result<(), std::io::Error> {
    if are_mates(header1, header2) {
        Ok(())
    } else {
        Err(IOError::new(
            ErrorKind::InvalidData,
            format!("Paired read IDs out of sync:\n\t{header1}\n\t{header2}\n"),
        ))
    }
}
