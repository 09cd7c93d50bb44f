use std::ffi::OsString;
use std::path::Path;

use thiserror::Error;

/// Arguments used for jobs that only name a file and a target extension.
pub const DEFAULT_CONVERT_ARGUMENTS: &[&str] = &[
    "-filter:v",
    "scale=trunc(iw/2)*2:trunc(ih/2)*2",
    "-c:a",
    "aac",
    "-max_muxing_queue_size",
    "1024",
];

/// Seek offset for the thumbnail frame, in seconds.
pub const THUMBNAIL_OFFSET_SECONDS: &str = "1";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArgumentError {
    #[error("unterminated {0} quote in argument string")]
    UnterminatedQuote(char),

    #[error("argument string ends with a dangling backslash")]
    DanglingEscape,
}

/// Splits a transcoder argument string into argv tokens.
///
/// Whitespace separates tokens. Single quotes are literal, double quotes allow
/// `\"` and `\\`, and a backslash outside quotes escapes the next character.
pub fn split_arguments(input: &str) -> Result<Vec<String>, ArgumentError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(ch) => current.push(ch),
                        None => return Err(ArgumentError::UnterminatedQuote('\'')),
                    }
                }
            }
            '"' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(ch @ ('"' | '\\')) => current.push(ch),
                            Some(ch) => {
                                current.push('\\');
                                current.push(ch);
                            }
                            None => return Err(ArgumentError::UnterminatedQuote('"')),
                        },
                        Some(ch) => current.push(ch),
                        None => return Err(ArgumentError::UnterminatedQuote('"')),
                    }
                }
            }
            '\\' => {
                in_token = true;
                match chars.next() {
                    Some(ch) => current.push(ch),
                    None => return Err(ArgumentError::DanglingEscape),
                }
            }
            c if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                in_token = true;
                current.push(c);
            }
        }
    }

    if in_token {
        tokens.push(current);
    }

    Ok(tokens)
}

/// `-i <input> <arguments...> <output>`
pub fn convert_args(input: &Path, arguments: &[String], output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::with_capacity(arguments.len() + 3);
    args.push("-i".into());
    args.push(input.into());
    args.extend(arguments.iter().map(OsString::from));
    args.push(output.into());
    args
}

/// `-i <input> -ss 1 -vframes 1 <thumbnail>`
pub fn thumbnail_args(input: &Path, thumbnail: &Path) -> Vec<OsString> {
    vec![
        "-i".into(),
        input.into(),
        "-ss".into(),
        THUMBNAIL_OFFSET_SECONDS.into(),
        "-vframes".into(),
        "1".into(),
        thumbnail.into(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_whitespace() {
        let args = split_arguments("  -vf scale=640:-2   -c:v libx264 ").unwrap();
        assert_eq!(args, vec!["-vf", "scale=640:-2", "-c:v", "libx264"]);
    }

    #[test]
    fn keeps_quoted_filters_together() {
        let args = split_arguments("-filter:v scale='trunc(iw/2)*2:trunc(ih/2)*2' -metadata title=\"My \\\"Film\\\"\"").unwrap();
        assert_eq!(
            args,
            vec![
                "-filter:v",
                "scale=trunc(iw/2)*2:trunc(ih/2)*2",
                "-metadata",
                "title=My \"Film\"",
            ]
        );
    }

    #[test]
    fn empty_quotes_produce_an_empty_token() {
        assert_eq!(split_arguments("-metadata ''").unwrap(), vec!["-metadata", ""]);
        assert!(split_arguments("   ").unwrap().is_empty());
    }

    #[test]
    fn backslash_escapes_whitespace_outside_quotes() {
        assert_eq!(split_arguments(r"a\ b c").unwrap(), vec!["a b", "c"]);
    }

    #[test]
    fn rejects_unbalanced_input() {
        assert_eq!(split_arguments("-vf 'scale"), Err(ArgumentError::UnterminatedQuote('\'')));
        assert_eq!(split_arguments("-vf \"scale"), Err(ArgumentError::UnterminatedQuote('"')));
        assert_eq!(split_arguments("-vf \\"), Err(ArgumentError::DanglingEscape));
    }

    #[test]
    fn builds_convert_argv_in_order() {
        let args = convert_args(
            Path::new("/in/a.mp4"),
            &["-vf".to_string(), "scale=640:-2".to_string()],
            Path::new("/out/a.mp4"),
        );
        assert_eq!(args, vec!["-i", "/in/a.mp4", "-vf", "scale=640:-2", "/out/a.mp4"]);
    }

    #[test]
    fn builds_thumbnail_argv_at_one_second() {
        let args = thumbnail_args(Path::new("/in/a.mp4"), Path::new("/thumbs/x.jpg"));
        assert_eq!(args, vec!["-i", "/in/a.mp4", "-ss", "1", "-vframes", "1", "/thumbs/x.jpg"]);
    }
}
