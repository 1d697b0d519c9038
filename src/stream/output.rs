use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

/// Longest line handed to the log; longer output is split into pieces of this size.
pub const MAX_LINE_LEN: usize = 8 * 1024;

/// Splits encoder output into log lines.
///
/// ffmpeg ends its progress updates with `\r` and everything else with `\n`,
/// so both count as line ends. Blank lines are dropped and trailing
/// whitespace is trimmed.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputLineCodec;

impl OutputLineCodec {
    fn to_line(bytes: &[u8]) -> Option<String> {
        let line = String::from_utf8_lossy(bytes);
        let line = line.trim_end();
        if line.is_empty() {
            None
        } else {
            Some(line.to_string())
        }
    }
}

impl Decoder for OutputLineCodec {
    type Item = String;
    type Error = std::io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, Self::Error> {
        loop {
            let window = buf.len().min(MAX_LINE_LEN);
            match buf[..window].iter().position(|b| matches!(b, b'\r' | b'\n')) {
                Some(end) => {
                    let line = buf.split_to(end);
                    buf.advance(1);
                    if let Some(line) = Self::to_line(&line) {
                        return Ok(Some(line));
                    }
                }
                None if buf.len() >= MAX_LINE_LEN => {
                    let line = buf.split_to(MAX_LINE_LEN);
                    if let Some(line) = Self::to_line(&line) {
                        return Ok(Some(line));
                    }
                }
                None => return Ok(None),
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, Self::Error> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }
        let rest = buf.split();
        Ok(Self::to_line(&rest))
    }
}
