use anyhow::Context;
use std::io::{BufRead, BufReader, BufWriter, Write};

/// ```
/// use std::io::BufRead;
/// let dir = tempfile::tempdir().unwrap();
/// let file = dir.path().join("info.mm");
/// std::fs::write(&file, "ctg1 PLACED\nAC1 0 3 0\n").unwrap();
///
/// let reader = oog::reader(file.to_str().unwrap()).unwrap();
/// assert_eq!(reader.lines().count(), 2);
///
/// assert!(oog::reader("no/such/file").is_err());
/// ```
pub fn reader(input: &str) -> anyhow::Result<Box<dyn BufRead>> {
    let reader: Box<dyn BufRead> = if input == "stdin" {
        Box::new(BufReader::new(std::io::stdin()))
    } else {
        let path = std::path::Path::new(input);
        let file = std::fs::File::open(path)
            .with_context(|| format!("could not open {}", path.display()))?;

        if path.extension() == Some(std::ffi::OsStr::new("gz")) {
            Box::new(BufReader::new(flate2::read::MultiGzDecoder::new(file)))
        } else {
            Box::new(BufReader::new(file))
        }
    };

    Ok(reader)
}

pub fn writer(output: &str) -> anyhow::Result<Box<dyn Write>> {
    let writer: Box<dyn Write> = if output == "stdout" {
        Box::new(BufWriter::new(std::io::stdout()))
    } else {
        let file = std::fs::File::create(output)
            .with_context(|| format!("could not create {}", output))?;
        Box::new(BufWriter::new(file))
    };

    Ok(writer)
}

/// Non-empty lines that are not `#` comments, paired with their 1-based line numbers.
pub fn data_lines(input: &str) -> anyhow::Result<Vec<(usize, String)>> {
    let mut lines = vec![];
    for (i, line) in reader(input)?.lines().enumerate() {
        let line = line.with_context(|| format!("could not read {}", input))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        lines.push((i + 1, trimmed.to_string()));
    }

    Ok(lines)
}
