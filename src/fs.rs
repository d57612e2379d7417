use std::error::Error;
use std::fs::File;
use std::io::{self, prelude::*};
use std::path::Path;

pub(crate) fn read_file<P: AsRef<Path>>(path: P) -> Result<String, Box<dyn Error>> {
    let mut file = File::open(path)?;

    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    Ok(contents)
}

/// Reads until EOF or until the line ending the level, whichever comes first.
///
/// A server keeps stdin open after sending the level so reading to EOF would block forever.
pub fn read_level<R: BufRead>(input: &mut R) -> Result<String, Box<dyn Error>> {
    let mut contents = String::new();
    loop {
        let read = input.read_line(&mut contents)?;
        if read == 0 || contents.trim_end().ends_with("#end") {
            return Ok(contents);
        }
    }
}

pub fn read_stdin() -> Result<String, Box<dyn Error>> {
    let stdin = io::stdin();
    let mut stdin = stdin.lock();
    read_level(&mut stdin)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reading_stops_at_end() {
        let mut input = "#domain\nhospital\n#end\nMove(E)\n".as_bytes();
        assert_eq!(read_level(&mut input).unwrap(), "#domain\nhospital\n#end\n");
        // the rest stays unread
        let mut rest = String::new();
        input.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "Move(E)\n");
    }

    #[test]
    fn reading_without_end() {
        let mut input = "#domain\nhospital".as_bytes();
        assert_eq!(read_level(&mut input).unwrap(), "#domain\nhospital");
    }
}
