//! TAR stream assembly with byte-offset tracking
//!
//! The counter sits between the TAR builder and the (optional) gzip encoder,
//! so positions always refer to the uncompressed TAR stream — exactly what
//! manifest offsets and ranged restore are defined against.

use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;

/// The byte range one member record occupies inside the TAR stream
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemberRange {
    /// First byte of the record (the header block)
    pub start: u64,
    /// Last byte of the record, block padding included
    pub stop: u64,
}

/// A `Write` wrapper that counts bytes passing through
struct CountingWriter<W> {
    inner: W,
    written: u64,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// The in-memory spool under the counter: plain bytes or a gzip encoder
enum Spool {
    Plain(Vec<u8>),
    Gzip(GzEncoder<Vec<u8>>),
}

impl Write for Spool {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Spool::Plain(v) => v.write(buf),
            Spool::Gzip(enc) => enc.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Spool::Plain(v) => v.flush(),
            Spool::Gzip(enc) => enc.flush(),
        }
    }
}

impl Spool {
    fn into_bytes(self) -> std::io::Result<Vec<u8>> {
        match self {
            Spool::Plain(v) => Ok(v),
            Spool::Gzip(enc) => enc.finish(),
        }
    }
}

/// A POSIX ustar stream under assembly, tracking uncompressed positions
pub struct TarStream {
    builder: tar::Builder<CountingWriter<Spool>>,
}

impl TarStream {
    /// Open a new stream; `compress` adds a gzip layer below the counter
    pub fn new(compress: bool) -> Self {
        let spool = if compress {
            Spool::Gzip(GzEncoder::new(Vec::new(), Compression::default()))
        } else {
            Spool::Plain(Vec::new())
        };
        Self {
            builder: tar::Builder::new(CountingWriter::new(spool)),
        }
    }

    /// Current position in the uncompressed TAR stream
    pub fn position(&mut self) -> u64 {
        self.builder.get_mut().written
    }

    /// Append one member record (header, content, block padding) and return
    /// the byte range it occupies
    pub fn append_member(
        &mut self,
        member_name: &str,
        content: &[u8],
        mtime: u64,
    ) -> std::io::Result<MemberRange> {
        let start = self.position();

        let mut header = tar::Header::new_ustar();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(mtime);
        self.builder.append_data(&mut header, member_name, content)?;

        let stop = self.position() - 1;
        Ok(MemberRange { start, stop })
    }

    /// Close the stream: flush the two zero end-of-archive blocks (and the
    /// gzip trailer when compressing) and return the persisted bytes
    pub fn finish(self) -> std::io::Result<Vec<u8>> {
        let counting = self.builder.into_inner()?;
        counting.inner.into_bytes()
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    const BLOCK: u64 = 512;

    #[test]
    fn first_member_occupies_header_plus_padded_content() {
        // 11 bytes of content: one header block + one padded content block
        let mut stream = TarStream::new(false);
        let range = stream
            .append_member("a.txt", b"hello world", 1_736_500_000)
            .unwrap();
        assert_eq!(range.start, 0);
        assert_eq!(range.stop, 1023);
    }

    #[test]
    fn consecutive_members_are_contiguous() {
        let mut stream = TarStream::new(false);
        let first = stream.append_member("a.txt", b"hello world", 0).unwrap();
        let second = stream.append_member("b.txt", b"hi\n", 0).unwrap();
        assert_eq!(first.stop, 1023);
        assert_eq!(second.start, 1024);
        assert_eq!(second.stop, 2047);
    }

    #[test]
    fn record_lengths_are_block_multiples() {
        let mut stream = TarStream::new(false);
        for (name, len) in [("empty", 0usize), ("one", 1), ("block", 512), ("big", 513)] {
            let content = vec![0xAB; len];
            let range = stream.append_member(name, &content, 0).unwrap();
            let record_len = range.stop - range.start + 1;
            assert_eq!(
                record_len % BLOCK,
                0,
                "{name}: record length {record_len} not a block multiple"
            );
        }
    }

    #[test]
    fn empty_member_is_a_single_header_block() {
        let mut stream = TarStream::new(false);
        let range = stream.append_member("empty.txt", b"", 0).unwrap();
        assert_eq!(range.stop - range.start + 1, BLOCK);
    }

    #[test]
    fn finish_appends_two_zero_blocks() {
        let mut stream = TarStream::new(false);
        let range = stream.append_member("a.txt", b"hello world", 0).unwrap();
        let bytes = stream.finish().unwrap();
        assert_eq!(bytes.len() as u64, range.stop + 1 + 2 * BLOCK);
        assert!(bytes[(range.stop as usize + 1)..].iter().all(|&b| b == 0));
    }

    #[test]
    fn archive_is_readable_by_a_stock_tar_reader() {
        let mut stream = TarStream::new(false);
        stream.append_member("dir/a.txt", b"hello world", 0).unwrap();
        stream.append_member("b.txt", b"hi\n", 0).unwrap();
        let bytes = stream.finish().unwrap();

        let mut archive = tar::Archive::new(std::io::Cursor::new(bytes));
        let mut names = Vec::new();
        let mut contents = Vec::new();
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            names.push(entry.path().unwrap().display().to_string());
            let mut buf = Vec::new();
            entry.read_to_end(&mut buf).unwrap();
            contents.push(buf);
        }
        assert_eq!(names, vec!["dir/a.txt", "b.txt"]);
        assert_eq!(contents[0], b"hello world");
        assert_eq!(contents[1], b"hi\n");
    }

    #[test]
    fn gzip_offsets_track_the_uncompressed_stream() {
        let mut plain = TarStream::new(false);
        let mut gz = TarStream::new(true);

        let payload = vec![b'x'; 2000];
        let plain_range = plain.append_member("x.bin", &payload, 0).unwrap();
        let gz_range = gz.append_member("x.bin", &payload, 0).unwrap();
        assert_eq!(plain_range, gz_range);

        let plain_bytes = plain.finish().unwrap();
        let gz_bytes = gz.finish().unwrap();
        assert_ne!(plain_bytes.len(), gz_bytes.len());
        // gzip magic
        assert_eq!(&gz_bytes[..2], &[0x1f, 0x8b]);

        // the decompressed object is exactly the plain TAR stream
        let mut decoder = flate2::read::GzDecoder::new(std::io::Cursor::new(gz_bytes));
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed).unwrap();
        assert_eq!(decompressed, plain_bytes);
    }

    #[test]
    fn long_member_names_still_extract_with_correct_ranges() {
        let long_name = format!("{}/leaf.txt", "deeply/nested".repeat(12));
        let mut stream = TarStream::new(false);
        let range = stream.append_member(&long_name, b"content", 0).unwrap();
        let second = stream.append_member("short.txt", b"x", 0).unwrap();
        assert_eq!(second.start, range.stop + 1);
        let bytes = stream.finish().unwrap();

        // Slice out the first record and read it back through a stock reader
        let mut record = bytes[range.start as usize..=range.stop as usize].to_vec();
        record.extend_from_slice(&[0u8; 1024]);
        let mut archive = tar::Archive::new(std::io::Cursor::new(record));
        let mut entries = archive.entries().unwrap();
        let mut entry = entries.next().unwrap().unwrap();
        assert_eq!(entry.path().unwrap().display().to_string(), long_name);
        let mut buf = Vec::new();
        entry.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"content");
    }
}
