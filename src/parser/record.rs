const TAG_STRING: u8 = 0x01;
const TAG_LOAD_CLASS: u8 = 0x02;
const TAG_UNLOAD_CLASS: u8 = 0x03;
const TAG_STACK_FRAME: u8 = 0x04;
const TAG_STACK_TRACE: u8 = 0x05;
const TAG_ALLOC_SITES: u8 = 0x06;
const TAG_HEAP_SUMMARY: u8 = 0x07;
const TAG_START_THREAD: u8 = 0x0A;
const TAG_END_THREAD: u8 = 0x0B;
const TAG_HEAP_DUMP: u8 = 0x0C;
const TAG_CPU_SAMPLES: u8 = 0x0D;
const TAG_CONTROL_SETTING: u8 = 0x0E;
const TAG_HEAP_DUMP_SEGMENT: u8 = 0x1C;
const TAG_HEAP_DUMP_END: u8 = 0x2C;

/// Size of the tag, timestamp and length prefix of every top-level record.
pub const RECORD_HEADER_LENGTH: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordTag {
    Utf8String,
    LoadClass,
    UnloadClass,
    StackFrame,
    StackTrace,
    AllocationSites,
    HeapSummary,
    StartThread,
    EndThread,
    HeapDump,
    CpuSamples,
    ControlSettings,
    HeapDumpSegment,
    HeapDumpEnd,
    Unknown(u8),
}

impl RecordTag {
    pub fn from_value(tag: u8) -> RecordTag {
        match tag {
            TAG_STRING => RecordTag::Utf8String,
            TAG_LOAD_CLASS => RecordTag::LoadClass,
            TAG_UNLOAD_CLASS => RecordTag::UnloadClass,
            TAG_STACK_FRAME => RecordTag::StackFrame,
            TAG_STACK_TRACE => RecordTag::StackTrace,
            TAG_ALLOC_SITES => RecordTag::AllocationSites,
            TAG_HEAP_SUMMARY => RecordTag::HeapSummary,
            TAG_START_THREAD => RecordTag::StartThread,
            TAG_END_THREAD => RecordTag::EndThread,
            TAG_HEAP_DUMP => RecordTag::HeapDump,
            TAG_CPU_SAMPLES => RecordTag::CpuSamples,
            TAG_CONTROL_SETTING => RecordTag::ControlSettings,
            TAG_HEAP_DUMP_SEGMENT => RecordTag::HeapDumpSegment,
            TAG_HEAP_DUMP_END => RecordTag::HeapDumpEnd,
            x => RecordTag::Unknown(x),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub tag: RecordTag,
    pub timestamp: u32,
    pub length: u32,
    /// Stream offset of the tag byte.
    pub offset: u64,
}

#[derive(Debug)]
pub struct RawRecord {
    pub header: RecordHeader,
    pub body: Vec<u8>,
}

impl RawRecord {
    /// Stream offset of the first body byte.
    pub fn body_offset(&self) -> u64 {
        self.header.offset + RECORD_HEADER_LENGTH as u64
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct Utf8StringData<'a> {
    pub id: u64,
    pub bytes: &'a [u8],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadClassData {
    pub class_object_id: u64,
    pub class_name_id: u64,
}
