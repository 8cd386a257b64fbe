use std::io::Read;

use ahash::AHashMap;

use crate::errors::{Diagnostics, HprofHistoError, HprofHistoWarning};
use crate::parser::gc_record::{FieldType, GcRecord};
use crate::parser::record::{RawRecord, RecordTag};
use crate::parser::record_parser::{parse_load_class, parse_utf8_string, record_result};
use crate::parser::record_reader::{RecordAction, RecordDispatch, RecordReader};

pub fn unresolved_name(id: u64) -> String {
    format!("<unresolved:{id}>")
}

fn malformed_string(id: u64) -> String {
    format!("<malformed-utf8:{id}>")
}

/// Turns a JVM internal class name into its source form.
/// `java/lang/String` -> `java.lang.String`, `[[I` -> `int[][]`, `[Ljava/lang/Object;` -> `java.lang.Object[]`
pub fn pretty_class_name(raw: &str) -> String {
    let dimensions = raw.chars().take_while(|c| *c == '[').count();
    if dimensions == 0 {
        return raw.replace('/', ".");
    }
    let element = &raw[dimensions..];
    let element_name = match element {
        "Z" => "boolean".to_string(),
        "B" => "byte".to_string(),
        "C" => "char".to_string(),
        "S" => "short".to_string(),
        "I" => "int".to_string(),
        "J" => "long".to_string(),
        "F" => "float".to_string(),
        "D" => "double".to_string(),
        _ if element.len() > 2 && element.starts_with('L') && element.ends_with(';') => {
            element[1..element.len() - 1].replace('/', ".")
        }
        // not a descriptor after all
        _ => return raw.replace('/', "."),
    };
    format!("{element_name}{}", "[]".repeat(dimensions))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLayout {
    pub super_class_object_id: u64,
    pub instance_fields: Vec<FieldType>,
}

/// Id-keyed lookups built by the first pass, read-only afterwards.
#[derive(Debug)]
pub struct SymbolTable {
    id_size: u32,
    strings: AHashMap<u64, Box<str>>,
    class_names: AHashMap<u64, Box<str>>,
    class_dumps: usize,
    // field bytes of an instance, super classes included
    instance_sizes: AHashMap<u64, u64>,
}

impl SymbolTable {
    pub fn new(id_size: u32) -> Self {
        SymbolTable {
            id_size,
            strings: AHashMap::new(),
            class_names: AHashMap::new(),
            class_dumps: 0,
            instance_sizes: AHashMap::new(),
        }
    }

    pub fn id_size(&self) -> u32 {
        self.id_size
    }

    pub fn string(&self, id: u64) -> Option<&str> {
        self.strings.get(&id).map(|s| &**s)
    }

    pub fn class_name(&self, class_object_id: u64) -> Option<&str> {
        self.class_names.get(&class_object_id).map(|s| &**s)
    }

    pub fn strings_len(&self) -> usize {
        self.strings.len()
    }

    pub fn classes_len(&self) -> usize {
        self.class_names.len()
    }

    pub fn layouts_len(&self) -> usize {
        self.class_dumps
    }

    /// Bytes of field data an instance of the class carries, its super classes' fields included.
    /// `None` if a class of the hierarchy has no layout or the hierarchy loops.
    pub fn instance_size(&self, class_object_id: u64) -> Option<u64> {
        self.instance_sizes.get(&class_object_id).copied()
    }
}

// walks the super class chain, giving up on a missing layout or a loop
fn flattened_instance_size(
    layouts: &AHashMap<u64, ClassLayout>,
    class_object_id: u64,
    id_size: u32,
) -> Option<u64> {
    let mut size = 0;
    let mut current = class_object_id;
    let mut depth = 0;
    while current != 0 {
        if depth > layouts.len() {
            return None;
        }
        let layout = layouts.get(&current)?;
        size += layout
            .instance_fields
            .iter()
            .map(|field_type| field_type.byte_size(id_size))
            .sum::<u64>();
        current = layout.super_class_object_id;
        depth += 1;
    }
    Some(size)
}

/// First pass: strings, class names and class layouts.
pub struct SymbolTableBuilder {
    table: SymbolTable,
    class_layouts: AHashMap<u64, ClassLayout>,
    diagnostics: Diagnostics,
    debug_mode: bool,
}

impl SymbolTableBuilder {
    pub fn new(id_size: u32, debug_mode: bool) -> Self {
        SymbolTableBuilder {
            table: SymbolTable::new(id_size),
            class_layouts: AHashMap::new(),
            diagnostics: Diagnostics::default(),
            debug_mode,
        }
    }

    fn on_utf8_string(&mut self, record: &RawRecord) -> Result<(), HprofHistoError> {
        let data = record_result(
            record.body_offset(),
            &record.body,
            parse_utf8_string(&record.body, self.table.id_size),
        )?;
        let text = match std::str::from_utf8(data.bytes) {
            Ok(text) => Box::from(text),
            Err(_) => {
                self.diagnostics.record(
                    HprofHistoWarning::MalformedString { id: data.id },
                    self.debug_mode,
                );
                malformed_string(data.id).into_boxed_str()
            }
        };
        self.table.strings.insert(data.id, text);
        Ok(())
    }

    fn on_load_class(&mut self, record: &RawRecord) -> Result<(), HprofHistoError> {
        let data = record_result(
            record.body_offset(),
            &record.body,
            parse_load_class(&record.body, self.table.id_size),
        )?;
        // the format guarantees the name string precedes the class load
        let class_name = match self.table.string(data.class_name_id) {
            Some(raw) => pretty_class_name(raw),
            None => {
                self.diagnostics.record(
                    HprofHistoWarning::UnresolvedReference {
                        id: data.class_name_id,
                    },
                    self.debug_mode,
                );
                unresolved_name(data.class_name_id)
            }
        };
        self.table
            .class_names
            .insert(data.class_object_id, class_name.into_boxed_str());
        Ok(())
    }

    fn on_gc_record(&mut self, gc_record: GcRecord) -> Result<(), HprofHistoError> {
        if let GcRecord::ClassDump {
            class_object_id,
            super_class_object_id,
            instance_fields,
        } = gc_record
        {
            let layout = ClassLayout {
                super_class_object_id,
                instance_fields,
            };
            self.class_layouts.insert(class_object_id, layout);
        }
        Ok(())
    }

    /// Flattens the class layouts into per class instance sizes.
    pub fn finish(self) -> (SymbolTable, Diagnostics) {
        let SymbolTableBuilder {
            mut table,
            class_layouts,
            diagnostics,
            ..
        } = self;
        let id_size = table.id_size;
        table.class_dumps = class_layouts.len();
        table.instance_sizes = class_layouts
            .keys()
            .filter_map(|&class_object_id| {
                flattened_instance_size(&class_layouts, class_object_id, id_size)
                    .map(|size| (class_object_id, size))
            })
            .collect();
        (table, diagnostics)
    }
}

impl RecordDispatch for SymbolTableBuilder {
    fn action_for(tag: RecordTag) -> RecordAction<Self> {
        match tag {
            RecordTag::Utf8String => RecordAction::Read(Self::on_utf8_string),
            RecordTag::LoadClass => RecordAction::Read(Self::on_load_class),
            RecordTag::HeapDump | RecordTag::HeapDumpSegment => {
                RecordAction::StreamSubRecords(Self::on_gc_record)
            }
            _ => RecordAction::Skip,
        }
    }
}

/// Runs the first pass over the whole stream.
pub fn build_symbol_table<R: Read>(
    reader: &mut RecordReader<R>,
    debug_mode: bool,
) -> Result<(SymbolTable, Diagnostics), HprofHistoError> {
    let mut builder = SymbolTableBuilder::new(reader.id_size(), debug_mode);
    reader.dispatch_all(&mut builder)?;
    Ok(builder.finish())
}
