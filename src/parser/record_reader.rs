use std::io::{self, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::errors::HprofHistoError;
use crate::errors::HprofHistoError::{InvalidHeader, InvalidRecord, TruncatedRecord};
use crate::parser::file_header_parser::{FileHeader, parse_file_header};
use crate::parser::gc_record::GcRecord;
use crate::parser::primitive_parsers::{parse_u8, parse_u32};
use crate::parser::record::{RECORD_HEADER_LENGTH, RawRecord, RecordHeader, RecordTag};
use crate::parser::record_parser::{CONTENT_OVERRUN, parse_error, parse_gc_record};
use nom::{Needed, Parser};

// longest format text accepted before giving up on finding its NUL terminator
const MAX_FORMAT_LENGTH: usize = 64;
// identifier size (u32) + timestamp (u64) following the format text
const HEADER_TRAILER_LENGTH: u64 = 12;
// bodies are read incrementally past this size so that a corrupt length cannot exhaust memory
const MAX_BODY_PREALLOCATION: usize = 64 * 1024 * 1024;
// heap dump bodies are pulled by chunks of this size, a sub-record larger than that grows the buffer
const SUB_RECORD_CHUNK_SIZE: usize = 1024 * 1024;

/// Counts the bytes pulled from the inner reader.
/// The counter is written by the parsing thread only and can be polled from any thread.
pub struct CountingReader<R> {
    inner: R,
    consumed: Arc<AtomicU64>,
}

impl<R: Read> CountingReader<R> {
    pub fn new(inner: R) -> Self {
        CountingReader {
            inner,
            consumed: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.consumed.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

pub type RecordHandler<S> = fn(&mut S, &RawRecord) -> Result<(), HprofHistoError>;
pub type GcRecordHandler<S> = fn(&mut S, GcRecord) -> Result<(), HprofHistoError>;

pub enum RecordAction<S> {
    Skip,
    /// Hands the whole body to the handler.
    Read(RecordHandler<S>),
    /// Hands the heap dump sub-records one by one to the handler, the body is never held whole.
    StreamSubRecords(GcRecordHandler<S>),
}

/// A pass over the record stream: maps each tag to what the pass does with it.
pub trait RecordDispatch: Sized {
    fn action_for(tag: RecordTag) -> RecordAction<Self>;
}

/// Streams the top-level records of an hprof source.
/// Each instance owns its source, several readers can run over the same file independently.
pub struct RecordReader<R> {
    reader: CountingReader<R>,
    file_header: FileHeader,
    position: u64,
    buffer_peak: usize,
    debug_mode: bool,
}

impl<R: Read> RecordReader<R> {
    pub fn new(source: R, debug_mode: bool) -> Result<Self, HprofHistoError> {
        let mut reader = RecordReader {
            reader: CountingReader::new(source),
            file_header: FileHeader {
                format: String::new(),
                size_pointers: 0,
                timestamp: 0,
            },
            position: 0,
            buffer_peak: 0,
            debug_mode,
        };
        reader.file_header = reader.read_file_header()?;
        Ok(reader)
    }

    fn read_file_header(&mut self) -> Result<FileHeader, HprofHistoError> {
        let mut header_buffer = Vec::with_capacity(MAX_FORMAT_LENGTH + 13);
        loop {
            if self.read_up_to(1, &mut header_buffer)? == 0 {
                return Err(InvalidHeader {
                    message: "unexpected end of file in format text".to_string(),
                });
            }
            if header_buffer.last() == Some(&0) {
                break;
            }
            if header_buffer.len() > MAX_FORMAT_LENGTH {
                return Err(InvalidHeader {
                    message: format!("format text longer than {MAX_FORMAT_LENGTH} bytes"),
                });
            }
        }
        if self.read_up_to(HEADER_TRAILER_LENGTH, &mut header_buffer)? != HEADER_TRAILER_LENGTH {
            return Err(InvalidHeader {
                message: "unexpected end of file in header".to_string(),
            });
        }
        let (_, header) = parse_file_header(&header_buffer).map_err(|e| InvalidHeader {
            message: format!("{e:?}"),
        })?;
        header.validate()
    }

    pub fn file_header(&self) -> &FileHeader {
        &self.file_header
    }

    pub fn id_size(&self) -> u32 {
        self.file_header.size_pointers
    }

    /// Shared handle on the number of bytes consumed so far.
    pub fn consumed(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.reader.consumed)
    }

    /// Largest heap dump buffer used so far.
    pub fn buffer_peak(&self) -> usize {
        self.buffer_peak
    }

    // appends at most `len` bytes to `buf`, returns how many were available
    fn read_up_to(&mut self, len: u64, buf: &mut Vec<u8>) -> Result<u64, HprofHistoError> {
        let read = (&mut self.reader).take(len).read_to_end(buf)? as u64;
        self.position += read;
        Ok(read)
    }

    /// Reads the tag, timestamp and length of the next record.
    /// Returns `None` once the source is exhausted on a record boundary.
    pub fn next_header(&mut self) -> Result<Option<RecordHeader>, HprofHistoError> {
        let offset = self.position;
        let mut buffer = Vec::with_capacity(RECORD_HEADER_LENGTH);
        let available = self.read_up_to(RECORD_HEADER_LENGTH as u64, &mut buffer)?;
        if available == 0 {
            return Ok(None);
        }
        if available < RECORD_HEADER_LENGTH as u64 {
            return Err(TruncatedRecord {
                offset,
                expected: RECORD_HEADER_LENGTH as u64,
                available,
            });
        }
        let (_, (tag, timestamp, length)) = (parse_u8, parse_u32, parse_u32)
            .parse(&buffer[..])
            .map_err(|e| InvalidHeader {
                message: format!("{e:?}"),
            })?;
        Ok(Some(RecordHeader {
            tag: RecordTag::from_value(tag),
            timestamp,
            length,
            offset,
        }))
    }

    pub fn read_body(&mut self, header: RecordHeader) -> Result<RawRecord, HprofHistoError> {
        let expected = u64::from(header.length);
        let mut body = Vec::with_capacity((header.length as usize).min(MAX_BODY_PREALLOCATION));
        let available = self.read_up_to(expected, &mut body)?;
        if available != expected {
            return Err(TruncatedRecord {
                offset: header.offset,
                expected,
                available,
            });
        }
        Ok(RawRecord { header, body })
    }

    // discards at most `len` bytes, returns how many were available
    fn skip_bytes(&mut self, len: u64) -> Result<u64, HprofHistoError> {
        let skipped = io::copy(&mut (&mut self.reader).take(len), &mut io::sink())?;
        self.position += skipped;
        Ok(skipped)
    }

    pub fn skip_body(&mut self, header: &RecordHeader) -> Result<(), HprofHistoError> {
        let expected = u64::from(header.length);
        let available = self.skip_bytes(expected)?;
        if available != expected {
            return Err(TruncatedRecord {
                offset: header.offset,
                expected,
                available,
            });
        }
        Ok(())
    }

    /// Decodes the sub-records of a heap dump body from a buffer refilled whenever the parser
    /// runs out of input. Instance and array contents are skipped in the stream.
    pub fn stream_sub_records<S>(
        &mut self,
        header: &RecordHeader,
        state: &mut S,
        handler: GcRecordHandler<S>,
    ) -> Result<(), HprofHistoError> {
        let id_size = self.id_size();
        let body_len = u64::from(header.length);
        // body bytes not pulled from the source yet
        let mut remaining = body_len;
        // stream offset of `buffer[0]`
        let mut buffer_offset = header.offset + RECORD_HEADER_LENGTH as u64;
        let mut buffer: Vec<u8> = Vec::with_capacity(SUB_RECORD_CHUNK_SIZE.min(body_len as usize));
        let mut start = 0;
        loop {
            if start == buffer.len() && remaining == 0 {
                return Ok(());
            }
            let sub_record_offset = buffer_offset + start as u64;
            let window = &buffer[start..];
            match parse_gc_record(window, id_size) {
                Ok((rest, gc_record)) => {
                    start = buffer.len() - rest.len();
                    let content_len = gc_record.content_len(id_size);
                    let buffered = rest.len() as u64;
                    if content_len <= buffered {
                        start += content_len as usize;
                    } else {
                        let missing = content_len - buffered;
                        if missing > remaining {
                            return Err(InvalidRecord {
                                offset: sub_record_offset,
                                message: CONTENT_OVERRUN.to_string(),
                            });
                        }
                        let skipped = self.skip_bytes(missing)?;
                        if skipped != missing {
                            return Err(TruncatedRecord {
                                offset: header.offset,
                                expected: body_len,
                                available: body_len - remaining + skipped,
                            });
                        }
                        remaining -= missing;
                        buffer_offset += buffer.len() as u64 + missing;
                        buffer.clear();
                        start = 0;
                    }
                    handler(state, gc_record)?;
                }
                Err(nom::Err::Incomplete(needed)) => {
                    if remaining == 0 {
                        return Err(InvalidRecord {
                            offset: sub_record_offset,
                            message: CONTENT_OVERRUN.to_string(),
                        });
                    }
                    buffer.drain(..start);
                    buffer_offset += start as u64;
                    start = 0;
                    // give back the room taken by a previous oversized sub-record
                    if buffer.capacity() > SUB_RECORD_CHUNK_SIZE {
                        buffer.shrink_to(SUB_RECORD_CHUNK_SIZE);
                    }
                    let needed = match needed {
                        Needed::Size(n) => n.get() as u64,
                        Needed::Unknown => 1,
                    };
                    let refill = SUB_RECORD_CHUNK_SIZE.saturating_sub(buffer.len()) as u64;
                    let wanted = needed.max(refill).min(remaining);
                    let read = self.read_up_to(wanted, &mut buffer)?;
                    if read != wanted {
                        return Err(TruncatedRecord {
                            offset: header.offset,
                            expected: body_len,
                            available: body_len - remaining + read,
                        });
                    }
                    remaining -= read;
                    self.buffer_peak = self.buffer_peak.max(buffer.len());
                }
                Err(e) => return Err(parse_error(sub_record_offset, window, &e)),
            }
        }
    }

    /// Drains the stream, handing the records the pass handles to their handler
    /// and skipping the others by length. Returns the number of records seen.
    pub fn dispatch_all<S: RecordDispatch>(&mut self, state: &mut S) -> Result<u64, HprofHistoError> {
        let mut records = 0;
        while let Some(header) = self.next_header()? {
            records += 1;
            let action = S::action_for(header.tag);
            if self.debug_mode {
                match (&action, header.tag) {
                    (RecordAction::Skip, RecordTag::Unknown(tag)) => {
                        println!("Skipping unknown record tag:{tag:#04x} offset:{}", header.offset);
                    }
                    (RecordAction::Skip, _) => (),
                    _ => println!(
                        "Found record tag:{:?} timestamp:{} length:{} offset:{}",
                        header.tag, header.timestamp, header.length, header.offset
                    ),
                }
            }
            match action {
                RecordAction::Skip => self.skip_body(&header)?,
                RecordAction::Read(handler) => {
                    let record = self.read_body(header)?;
                    handler(state, &record)?;
                }
                RecordAction::StreamSubRecords(handler) => {
                    self.stream_sub_records(&header, state, handler)?;
                }
            }
        }
        if self.debug_mode {
            println!("Heap dump buffer peak: {} bytes", self.buffer_peak);
        }
        Ok(records)
    }
}
