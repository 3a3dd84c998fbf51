// Entropy pool feeding the DRBG one byte at a time.
//
// The pool buffers bytes drawn from a host randomness device and serves them
// through the three-command protocol the DRBG speaks ([`EntropyCmd`]).
// Device reads never fail from the caller's point of view: short reads and
// I/O errors are retried after a pause until the request is satisfied.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::thread;
use std::time::Duration;

use tracing::{debug, trace, warn};
use zeroize::Zeroize;

pub use crate::error::EntropyError;

/// Default pool size in bytes.
pub const POOL_LEN: usize = 4096;

/// Largest single read issued to a randomness device.
pub const MAX_READ_CHUNK: usize = 1 << 20;

/// Pause between retries of a failed device read or open.
pub const DEFAULT_RETRY_PAUSE: Duration = Duration::from_secs(1);

/// Commands of the entropy callback protocol.
///
/// The numeric codes are the wire values accepted by
/// [`EntropyPool::call_raw`]; any other code fails closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EntropyCmd {
    /// (Re)fill the pool completely and rewind the cursor.
    Init = 0,
    /// Report how many source bytes yield one byte of full entropy.
    GetNumBytesPerByteOfEntropy = 1,
    /// Deliver the next entropy byte.
    GetByteOfEntropy = 2,
}

impl TryFrom<u8> for EntropyCmd {
    type Error = EntropyError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(EntropyCmd::Init),
            1 => Ok(EntropyCmd::GetNumBytesPerByteOfEntropy),
            2 => Ok(EntropyCmd::GetByteOfEntropy),
            other => Err(EntropyError::UnsupportedCommand(other)),
        }
    }
}

/// The callback a DRBG instantiates against.
pub trait EntropyFn {
    fn call(&mut self, cmd: EntropyCmd, out: Option<&mut u8>) -> Result<(), EntropyError>;
}

impl<F> EntropyFn for F
where
    F: FnMut(EntropyCmd, Option<&mut u8>) -> Result<(), EntropyError>,
{
    fn call(&mut self, cmd: EntropyCmd, out: Option<&mut u8>) -> Result<(), EntropyError> {
        self(cmd, out)
    }
}

/// A host randomness device.
///
/// `read` may return fewer bytes than asked for, zero bytes, or an error;
/// [`read_full`] turns that into a blocking "fill everything" contract.
pub trait RandomDevice {
    fn name(&self) -> &str;

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// The operating system generator, via `getrandom`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRandom;

impl RandomDevice for SystemRandom {
    fn name(&self) -> &str {
        "system"
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        getrandom::getrandom(buf).map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        Ok(buf.len())
    }
}

/// A character device such as `/dev/urandom`.
#[derive(Debug)]
pub struct FileDevice {
    file: File,
}

impl FileDevice {
    /// Opens `path`, retrying every `pause` until the open succeeds.
    pub fn open_retrying(path: impl AsRef<Path>, pause: Duration) -> Self {
        let path = path.as_ref();
        loop {
            match File::open(path) {
                Ok(file) => return Self { file },
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "cannot open randomness device, retrying");
                    thread::sleep(pause);
                }
            }
        }
    }
}

impl RandomDevice for FileDevice {
    fn name(&self) -> &str {
        "file"
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

/// Fills `out` completely from `device`.
///
/// Reads are issued in chunks of at most [`MAX_READ_CHUNK`] bytes. A read that
/// yields nothing or errors is retried after `pause`; there is no timeout.
pub fn read_full<D: RandomDevice + ?Sized>(device: &mut D, out: &mut [u8], pause: Duration) {
    let mut off = 0usize;
    while off < out.len() {
        let chunk = (out.len() - off).min(MAX_READ_CHUNK);
        match device.read(&mut out[off..off + chunk]) {
            Ok(n) if n >= 1 => off += n.min(chunk),
            Ok(_) => {
                warn!(device = device.name(), "randomness device returned no data, retrying");
                thread::sleep(pause);
            }
            Err(e) => {
                warn!(device = device.name(), error = %e, "randomness device read failed, retrying");
                thread::sleep(pause);
            }
        }
    }
}

/// Fixed-capacity byte buffer plus cursor.
///
/// Invariant: `cursor <= capacity`. A fresh pool starts drained
/// (`cursor == capacity`) so the first byte request refills it.
pub struct EntropyPool<D: RandomDevice = SystemRandom> {
    buf: Vec<u8>,
    cursor: usize,
    device: D,
    retry_pause: Duration,
}

impl EntropyPool<SystemRandom> {
    /// Pool of [`POOL_LEN`] bytes over the OS generator.
    pub fn system() -> Self {
        Self::new(SystemRandom)
    }
}

impl<D: RandomDevice> EntropyPool<D> {
    pub fn new(device: D) -> Self {
        Self::with_capacity(device, POOL_LEN)
    }

    /// Capacity is clamped to at least one byte.
    pub fn with_capacity(device: D, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buf: vec![0u8; capacity],
            cursor: capacity,
            device,
            retry_pause: DEFAULT_RETRY_PAUSE,
        }
    }

    pub fn with_retry_pause(mut self, pause: Duration) -> Self {
        self.retry_pause = pause;
        self
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// `INIT`: refill the whole buffer and rewind.
    pub fn init(&mut self) {
        self.refill();
    }

    /// `GET_NUM_BYTES_PER_BYTE_OF_ENTROPY`: the device is a full-entropy source.
    pub fn bytes_per_entropy_byte(&self, out: Option<&mut u8>) -> Result<(), EntropyError> {
        let out = out.ok_or(EntropyError::NoOutput)?;
        *out = 1;
        Ok(())
    }

    /// `GET_BYTE_OF_ENTROPY`: next byte, refilling synchronously when drained.
    pub fn next_byte(&mut self, out: Option<&mut u8>) -> Result<(), EntropyError> {
        let out = out.ok_or(EntropyError::NoOutput)?;
        if self.cursor == self.buf.len() {
            self.refill();
        }
        *out = self.buf[self.cursor];
        self.cursor += 1;
        Ok(())
    }

    /// Dispatches a numeric command code; unknown codes fail.
    pub fn call_raw(&mut self, code: u8, out: Option<&mut u8>) -> Result<(), EntropyError> {
        let cmd = EntropyCmd::try_from(code)?;
        self.call(cmd, out)
    }

    fn refill(&mut self) {
        trace!(device = self.device.name(), len = self.buf.len(), "refilling entropy pool");
        read_full(&mut self.device, &mut self.buf, self.retry_pause);
        self.cursor = 0;
    }
}

impl<D: RandomDevice> EntropyFn for EntropyPool<D> {
    fn call(&mut self, cmd: EntropyCmd, out: Option<&mut u8>) -> Result<(), EntropyError> {
        match cmd {
            EntropyCmd::Init => {
                debug!("entropy pool init");
                self.init();
                Ok(())
            }
            EntropyCmd::GetNumBytesPerByteOfEntropy => self.bytes_per_entropy_byte(out),
            EntropyCmd::GetByteOfEntropy => self.next_byte(out),
        }
    }
}

impl<D: RandomDevice> Drop for EntropyPool<D> {
    fn drop(&mut self) {
        self.buf.zeroize();
    }
}
