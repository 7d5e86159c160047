use std::io;
use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Split};

const FORM_FEED: u8 = 0x0c;

/// One physical report page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// 1-based position in the file, blank pages included.
    pub number: usize,
    pub text: String,
    /// Invalid UTF-8 was replaced while decoding.
    pub lossy: bool,
}

/// Reads a report one form-feed separated page at a time.
pub struct PageStream<R> {
    segments: Split<R>,
    number: usize,
}

impl<R: AsyncBufRead + Unpin> PageStream<R> {
    pub fn new(reader: R) -> Self {
        PageStream {
            segments: reader.split(FORM_FEED),
            number: 0,
        }
    }

    /// Next non-blank page, or `None` at end of input.
    pub async fn next_page(&mut self) -> io::Result<Option<Page>> {
        while let Some(bytes) = self.segments.next_segment().await? {
            self.number += 1;
            if bytes.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            let (text, lossy) = match String::from_utf8(bytes) {
                Ok(text) => (text, false),
                Err(err) => (String::from_utf8_lossy(err.as_bytes()).into_owned(), true),
            };
            return Ok(Some(Page {
                number: self.number,
                text,
                lossy,
            }));
        }
        Ok(None)
    }
}

impl PageStream<BufReader<File>> {
    pub async fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path).await?;
        Ok(PageStream::new(BufReader::new(file)))
    }
}
