//! Writing decomposed messages to disk.
//!
//! The body goes to the path the caller picks; attachments go into a
//! directory next to it named after the path's stem, so `mail/report.txt`
//! puts attachments under `mail/report/`. Existing files are never
//! overwritten: a ` (1)`, ` (2)`, ... suffix is inserted before the
//! extension instead.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use unicode_normalization::UnicodeNormalization;

use crate::error::{Error, Result};
use crate::message::{Attachment, Decomposed};

/// Longest filename, in bytes, most filesystems accept.
const MAX_FILENAME_BYTES: usize = 255;

/// Name used when nothing usable is left of a filename.
const FALLBACK_NAME: &str = "attachment";

/// Characters Windows does not allow in filenames.
const RESERVED_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Device names Windows reserves regardless of extension.
const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Extensions longer than this are treated as part of the name when
/// truncating.
const MAX_EXTENSION_BYTES: usize = 16;

/// Upper bound on sanitizing passes; real names settle after one or two.
const MAX_PASSES: usize = 8;

/// Files written by [`persist`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Persisted {
    /// Where the body was written, if the message had one.
    pub body: Option<PathBuf>,
    /// Where each attachment was written, in order.
    pub attachments: Vec<PathBuf>,
}

/// Writes the body to `target` and the attachments next to it.
///
/// # Errors
///
/// Returns [`Error::Command`] if `target` has no file name, and
/// [`Error::Io`] if a directory or file cannot be created.
pub async fn persist(message: &Decomposed, target: impl AsRef<Path>) -> Result<Persisted> {
    let target = target.as_ref();
    let stem = target
        .file_stem()
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| Error::Command(format!("No file name in {}", target.display())))?;
    let parent = target.parent().unwrap_or_else(|| Path::new(""));

    let body = match &message.body {
        Some(text) => {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
            Some(write_new(target, text.as_bytes()).await?)
        }
        None => None,
    };

    let attachments = if message.attachments.is_empty() {
        Vec::new()
    } else {
        persist_attachments(&message.attachments, parent.join(stem)).await?
    };

    Ok(Persisted { body, attachments })
}

/// Writes attachments into `dir`, creating it if needed.
///
/// Each file is named after the attachment's sanitized filename, or its
/// key when it has none. Text is written as UTF-8.
///
/// # Errors
///
/// Returns [`Error::Io`] if the directory or a file cannot be created.
pub async fn persist_attachments(
    attachments: &[(String, Attachment)],
    dir: impl AsRef<Path>,
) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).await?;

    let mut written = Vec::with_capacity(attachments.len());
    for (key, attachment) in attachments {
        let name = sanitize_filename(attachment.filename.as_deref().unwrap_or(key));
        let path = write_new(&dir.join(name), attachment.buffer.as_bytes()).await?;
        tracing::debug!(
            path = %path.display(),
            bytes = attachment.buffer.len(),
            "Saved attachment"
        );
        written.push(path);
    }
    Ok(written)
}

/// Writes `contents` to `path`, or to the first free ` (n)` variant of it.
async fn write_new(path: &Path, contents: &[u8]) -> Result<PathBuf> {
    let mut attempt = 0;
    loop {
        let candidate = numbered(path, attempt);
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
            .await
        {
            Ok(mut file) => {
                file.write_all(contents).await?;
                file.flush().await?;
                return Ok(candidate);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(e.into()),
        }
    }
}

/// Returns `path` with ` (n)` inserted before the extension; `n == 0` keeps
/// the path as is.
fn numbered(path: &Path, n: usize) -> PathBuf {
    if n == 0 {
        return path.to_path_buf();
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem} ({n}).{}", ext.to_string_lossy()),
        None => format!("{stem} ({n})"),
    };
    path.with_file_name(name)
}

/// Makes a filename safe to create on any common filesystem.
///
/// The name is NFKC-normalized; path separators, control characters and
/// characters Windows reserves are removed; leading and trailing spaces and
/// dots are trimmed; Windows device names get a `_` prefix; the result is
/// cut to 255 bytes, keeping the extension. An empty result becomes
/// `attachment`. Sanitizing a sanitized name returns it unchanged.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let mut current = sanitize_pass(name);
    for _ in 1..MAX_PASSES {
        let next = sanitize_pass(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn sanitize_pass(name: &str) -> String {
    let cleaned: String = name
        .nfkc()
        .filter(|&c| !c.is_control() && !is_separator(c) && !RESERVED_CHARS.contains(&c))
        .collect();
    let trimmed = trim_name(&cleaned);

    if trimmed.is_empty() {
        return FALLBACK_NAME.to_string();
    }

    let name = if is_reserved_device(trimmed) {
        format!("_{trimmed}")
    } else {
        trimmed.to_string()
    };
    truncate_name(&name)
}

const fn is_separator(c: char) -> bool {
    matches!(c, '\u{2028}' | '\u{2029}')
}

fn trim_name(name: &str) -> &str {
    name.trim_matches(|c: char| c == ' ' || c == '.')
}

fn is_reserved_device(name: &str) -> bool {
    let base = name.split('.').next().unwrap_or(name).trim_end();
    RESERVED_NAMES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(base))
}

/// Cuts `name` to [`MAX_FILENAME_BYTES`] on a character boundary, keeping a
/// short extension intact.
fn truncate_name(name: &str) -> String {
    if name.len() <= MAX_FILENAME_BYTES {
        return name.to_string();
    }

    if let Some((stem, ext)) = name.rsplit_once('.') {
        if !stem.is_empty() && !ext.is_empty() && ext.len() <= MAX_EXTENSION_BYTES {
            let budget = MAX_FILENAME_BYTES - ext.len() - 1;
            let stem = trim_name(floor_boundary(stem, budget));
            if !stem.is_empty() {
                return format!("{stem}.{ext}");
            }
        }
    }

    trim_name(floor_boundary(name, MAX_FILENAME_BYTES)).to_string()
}

/// Returns the longest prefix of `s` of at most `max` bytes.
fn floor_boundary(s: &str, max: usize) -> &str {
    let mut end = max.min(s.len());
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use crate::message::{Buffer, decompose};
    use proptest::prelude::*;

    const MESSAGE: &str = concat!(
        "From: Some One <someone@example.com>\n",
        "Content-Type: multipart/mixed; boundary=\"XXXXboundary text\"\n",
        "\n",
        "--XXXXboundary text\n",
        "Content-Type: text/plain\n",
        "\n",
        "this is the body text\n",
        "\n",
        "--XXXXboundary text\n",
        "Content-Type: text/plain;\n",
        "Content-Disposition: attachment; filename=\"test.txt\"\n",
        "\n",
        "this is the attachment text\n",
        "--XXXXboundary text--",
    );

    fn text_attachment(name: Option<&str>, text: &str) -> Attachment {
        Attachment {
            content_type: "text/plain".into(),
            filename: name.map(str::to_string),
            buffer: Buffer::Text(text.into()),
        }
    }

    #[test]
    fn test_sanitize_plain_name_untouched() {
        assert_eq!(sanitize_filename("report.pdf"), "report.pdf");
        assert_eq!(sanitize_filename("naïve plan.txt"), "naïve plan.txt");
    }

    #[test]
    fn test_sanitize_strips_reserved_and_separators() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "etcpasswd");
        assert_eq!(sanitize_filename("a<b>c:d\"e|f?g*h.txt"), "abcdefgh.txt");
        assert_eq!(sanitize_filename("dir\\file.txt"), "dirfile.txt");
        assert_eq!(sanitize_filename("tab\there\n.txt"), "tabhere.txt");
    }

    #[test]
    fn test_sanitize_trims_dots_and_spaces() {
        assert_eq!(sanitize_filename("  .hidden. "), "hidden");
        assert_eq!(sanitize_filename("name.txt..."), "name.txt");
    }

    #[test]
    fn test_sanitize_normalizes() {
        // Fullwidth characters fold to ASCII, including reserved ones.
        assert_eq!(sanitize_filename("ｆｉｌｅ＜１＞.txt"), "file1.txt");
        assert_eq!(sanitize_filename("e\u{301}.txt"), "é.txt");
    }

    #[test]
    fn test_sanitize_reserved_device_names() {
        assert_eq!(sanitize_filename("CON"), "_CON");
        assert_eq!(sanitize_filename("nul.txt"), "_nul.txt");
        assert_eq!(sanitize_filename("Com1.tar.gz"), "_Com1.tar.gz");
        assert_eq!(sanitize_filename("console.txt"), "console.txt");
    }

    #[test]
    fn test_sanitize_fallback() {
        assert_eq!(sanitize_filename(""), "attachment");
        assert_eq!(sanitize_filename("..."), "attachment");
        assert_eq!(sanitize_filename("///"), "attachment");
    }

    #[test]
    fn test_sanitize_truncates_keeping_extension() {
        let long = format!("{}.pdf", "a".repeat(300));
        let sanitized = sanitize_filename(&long);
        assert_eq!(sanitized.len(), 255);
        assert!(sanitized.ends_with(".pdf"));

        let multibyte = format!("{}.txt", "é".repeat(200));
        let sanitized = sanitize_filename(&multibyte);
        assert!(sanitized.len() <= 255);
        assert!(sanitized.ends_with(".txt"));
    }

    #[test]
    fn test_numbered() {
        let path = Path::new("/tmp/x/report.pdf");
        assert_eq!(numbered(path, 0), PathBuf::from("/tmp/x/report.pdf"));
        assert_eq!(numbered(path, 2), PathBuf::from("/tmp/x/report (2).pdf"));
        assert_eq!(numbered(Path::new("notes"), 1), PathBuf::from("notes (1)"));
    }

    #[tokio::test]
    async fn test_persist_body_and_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("test.txt");
        let decomposed = decompose(MESSAGE).unwrap();

        let persisted = persist(&decomposed, &target).await.unwrap();

        assert_eq!(persisted.body.as_deref(), Some(target.as_path()));
        assert_eq!(
            std::fs::read_to_string(&target).unwrap(),
            "this is the body text\n"
        );
        let attachment_path = dir.path().join("test").join("test.txt");
        assert_eq!(persisted.attachments, vec![attachment_path.clone()]);
        assert_eq!(
            std::fs::read_to_string(attachment_path).unwrap(),
            "this is the attachment text"
        );
    }

    #[tokio::test]
    async fn test_persist_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("mail.txt");
        let decomposed = decompose(MESSAGE).unwrap();

        persist(&decomposed, &target).await.unwrap();
        let second = persist(&decomposed, &target).await.unwrap();

        assert_eq!(second.body, Some(dir.path().join("mail (1).txt")));
        assert_eq!(
            second.attachments,
            vec![dir.path().join("mail").join("test (1).txt")]
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("mail.txt")).unwrap(),
            "this is the body text\n"
        );
    }

    #[tokio::test]
    async fn test_persist_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a").join("b").join("msg.eml");
        let persisted = persist(&decompose(MESSAGE).unwrap(), &target).await.unwrap();
        assert!(target.is_file());
        assert!(persisted.attachments[0].starts_with(dir.path().join("a").join("b").join("msg")));
    }

    #[tokio::test]
    async fn test_persist_attachments_binary_and_unnamed() {
        let dir = tempfile::tempdir().unwrap();
        let attachments = vec![
            (
                "attachment_0".to_string(),
                Attachment {
                    content_type: "application/octet-stream".into(),
                    filename: Some("data.bin".into()),
                    buffer: Buffer::Binary(vec![0, 159, 146, 150]),
                },
            ),
            ("attachment_1".to_string(), text_attachment(None, "hello")),
            ("attachment_2".to_string(), text_attachment(Some("../evil.txt"), "x")),
        ];

        let written = persist_attachments(&attachments, dir.path()).await.unwrap();

        assert_eq!(
            written,
            vec![
                dir.path().join("data.bin"),
                dir.path().join("attachment_1"),
                dir.path().join("evil.txt"),
            ]
        );
        assert_eq!(std::fs::read(&written[0]).unwrap(), vec![0, 159, 146, 150]);
        assert_eq!(std::fs::read_to_string(&written[1]).unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_persist_without_file_name() {
        let decomposed = decompose(MESSAGE).unwrap();
        let err = persist(&decomposed, "/").await.unwrap_err();
        assert!(matches!(err, Error::Command(_)));
    }

    proptest! {
        #[test]
        fn test_sanitize_properties(name in "\\PC{0,300}") {
            let once = sanitize_filename(&name);
            prop_assert!(!once.is_empty());
            prop_assert!(once.len() <= MAX_FILENAME_BYTES);
            prop_assert!(!once.contains(RESERVED_CHARS));
            prop_assert!(!is_reserved_device(&once));
            prop_assert_eq!(sanitize_filename(&once), once.clone());
        }

        #[test]
        fn test_sanitize_reserved_names_prefixed(
            index in 0..RESERVED_NAMES.len(),
            ext in proptest::option::of("[a-z]{1,4}"),
        ) {
            let name = match ext {
                Some(ext) => format!("{}.{ext}", RESERVED_NAMES[index].to_lowercase()),
                None => RESERVED_NAMES[index].to_string(),
            };
            let sanitized = sanitize_filename(&name);
            prop_assert!(sanitized.starts_with('_'));
            prop_assert_eq!(&sanitized[1..], name.as_str());
        }
    }
}
