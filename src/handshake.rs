//! Inspector handshake
//!
//! Single-use rendezvous with the debugger driving this process:
//! 1. write the readiness token to the output channel, flush it
//! 2. close the output channel for good, so nothing can follow the token
//! 3. block reading one whitespace-delimited token from the input channel
//!
//! Whatever is read in step 3, including end of stream, releases the process.
//! The handshake is consumed by the call, so it cannot run twice.

use std::io::{self, BufRead, Stdin, StdinLock, Stdout, Write};

use crate::error::FixtureError;

/// Output side of the handshake that can be closed irrevocably
pub trait OutputChannel: Write {
    fn close(self) -> io::Result<()>;
}

/// Process stdout; closing it closes file descriptor 1
pub struct StdoutChannel {
    stdout: Stdout,
}

impl StdoutChannel {
    fn new() -> Self {
        Self {
            stdout: io::stdout(),
        }
    }
}

impl Write for StdoutChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stdout.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stdout.flush()
    }
}

impl OutputChannel for StdoutChannel {
    fn close(mut self) -> io::Result<()> {
        self.stdout.flush()?;
        close_stdout_descriptor()
    }
}

#[cfg(unix)]
fn close_stdout_descriptor() -> io::Result<()> {
    // SAFETY: fd 1 belongs to this process and the std buffer in front of it
    // was flushed by the caller. Later writes through `Stdout` hit EBADF.
    let rc = unsafe { libc::close(libc::STDOUT_FILENO) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

// No portable close; the channel is consumed and never written again.
#[cfg(not(unix))]
fn close_stdout_descriptor() -> io::Result<()> {
    Ok(())
}

/// What ended the wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Release {
    Token(String),
    EndOfStream,
}

pub struct InspectorHandshake<W, R> {
    output: W,
    input: R,
    token: String,
}

impl InspectorHandshake<StdoutChannel, StdinLock<'static>> {
    /// Handshake over the process stdout/stdin
    pub fn stdio(token: impl Into<String>) -> Self {
        let stdin: Stdin = io::stdin();
        Self::new(StdoutChannel::new(), stdin.lock(), token)
    }
}

impl<W: OutputChannel, R: BufRead> InspectorHandshake<W, R> {
    pub fn new(output: W, input: R, token: impl Into<String>) -> Self {
        Self {
            output,
            input,
            token: token.into(),
        }
    }

    /// Announces readiness, closes the output channel and blocks until the
    /// inspector releases the process.
    pub fn announce_ready_and_wait_for_release(self) -> Result<Release, FixtureError> {
        let Self {
            mut output,
            mut input,
            token,
        } = self;

        output
            .write_all(token.as_bytes())
            .and_then(|()| output.flush())
            .map_err(|err| FixtureError::ChannelWrite {
                reason: err.to_string(),
            })?;
        output.close().map_err(|err| FixtureError::ChannelClose {
            reason: err.to_string(),
        })?;
        tracing::info!("[Handshake] Announced {:?}, waiting for release", token);

        let release = read_release(&mut input).map_err(|err| FixtureError::ChannelRead {
            reason: err.to_string(),
        })?;
        tracing::info!("[Handshake] Released by {:?}", release);
        Ok(release)
    }
}

/// Reads one whitespace-delimited token, skipping leading whitespace.
///
/// The whitespace that ends the token is left unread. End of stream before
/// any token is a release too.
pub fn read_release<R: BufRead>(input: &mut R) -> io::Result<Release> {
    let mut token = Vec::new();

    loop {
        let available = match input.fill_buf() {
            Ok(available) => available,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        if available.is_empty() {
            break;
        }

        let mut consumed = 0;
        let mut complete = false;
        for &byte in available {
            if byte.is_ascii_whitespace() {
                if token.is_empty() {
                    consumed += 1;
                    continue;
                }
                complete = true;
                break;
            }
            token.push(byte);
            consumed += 1;
        }
        input.consume(consumed);

        if complete {
            break;
        }
    }

    if token.is_empty() {
        Ok(Release::EndOfStream)
    } else {
        Ok(Release::Token(String::from_utf8_lossy(&token).into_owned()))
    }
}


#[cfg(test)]
mod tests {
    use std::io::{self, BufRead, Cursor, Read};

    use super::testing::{recording, ChannelEvent};
    use super::*;

    #[test]
    fn test_token_flushed_and_closed_before_any_read() {
        let (trace, output, input) = recording(b"exit\n");
        let release = InspectorHandshake::new(output, input, "ready")
            .announce_ready_and_wait_for_release()
            .unwrap();
        assert_eq!(release, Release::Token("exit".to_string()));

        let events = trace.borrow();
        let first_read = events
            .iter()
            .position(|e| *e == ChannelEvent::Read)
            .expect("input was read");
        let close = events
            .iter()
            .position(|e| *e == ChannelEvent::Close)
            .expect("output was closed");
        assert!(close < first_read, "close must precede reads: {:?}", events);
        assert_eq!(events[0], ChannelEvent::Write(b"ready".to_vec()));
        assert_eq!(events[1], ChannelEvent::Flush);

        let written: Vec<u8> = events
            .iter()
            .filter_map(|e| match e {
                ChannelEvent::Write(bytes) => Some(bytes.clone()),
                _ => None,
            })
            .flatten()
            .collect();
        assert_eq!(written, b"ready", "token is written without a newline");
    }

    #[test]
    fn test_end_of_stream_releases() {
        let (_, output, input) = recording(b"");
        let release = InspectorHandshake::new(output, input, "ready")
            .announce_ready_and_wait_for_release()
            .unwrap();
        assert_eq!(release, Release::EndOfStream);
    }

    #[test]
    fn test_payload_is_not_validated() {
        for payload in [&b"x"[..], &b"  \n\tquit now"[..], &b"\x01"[..]] {
            let (_, output, input) = recording(payload);
            let release = InspectorHandshake::new(output, input, "ready")
                .announce_ready_and_wait_for_release()
                .unwrap();
            assert!(
                matches!(release, Release::Token(_)),
                "payload {:?} should release",
                payload
            );
        }
    }

    #[test]
    fn test_close_failure_is_reported_before_reading() {
        let (trace, mut output, input) = recording(b"go");
        output.fail_close = true;
        let err = InspectorHandshake::new(output, input, "ready")
            .announce_ready_and_wait_for_release()
            .unwrap_err();
        assert!(matches!(err, FixtureError::ChannelClose { .. }));
        assert!(
            !trace.borrow().contains(&ChannelEvent::Read),
            "no read may happen after a failed close"
        );
    }

    struct BrokenInput;

    impl Read for BrokenInput {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "inspector vanished"))
        }
    }

    impl BufRead for BrokenInput {
        fn fill_buf(&mut self) -> io::Result<&[u8]> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "inspector vanished"))
        }

        fn consume(&mut self, _amt: usize) {}
    }

    #[test]
    fn test_read_failure_is_fatal() {
        let (_, output, _) = recording(b"");
        let err = InspectorHandshake::new(output, BrokenInput, "ready")
            .announce_ready_and_wait_for_release()
            .unwrap_err();
        assert!(matches!(err, FixtureError::ChannelRead { .. }));
    }

    #[test]
    fn test_read_release_leaves_delimiter_unread() {
        let mut input = Cursor::new(b"\n  first second".to_vec());
        assert_eq!(
            read_release(&mut input).unwrap(),
            Release::Token("first".to_string())
        );
        let mut rest = String::new();
        input.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, " second");
    }

    #[test]
    fn test_read_release_spans_buffer_refills() {
        let inner = Cursor::new(b"  longtoken\n".to_vec());
        let mut input = io::BufReader::with_capacity(3, inner);
        assert_eq!(
            read_release(&mut input).unwrap(),
            Release::Token("longtoken".to_string())
        );
    }
}
