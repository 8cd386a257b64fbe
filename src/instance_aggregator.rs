use std::borrow::Cow;
use std::io::Read;
use std::mem;

use ahash::AHashMap;

use crate::errors::{Diagnostics, HprofHistoError, HprofHistoWarning};
use crate::histogram::{ClassHistogram, ClassStats};
use crate::parser::gc_record::{FieldType, GcRecord};
use crate::parser::record::RecordTag;
use crate::parser::record_reader::{RecordAction, RecordDispatch, RecordReader};
use crate::symbol_table::{SymbolTable, unresolved_name};

/// Bytes charged to every array on top of its elements: the object header plus the length field.
/// Real JVMs vary (compressed class pointers, 32 bits VMs), hence overridable.
pub const DEFAULT_ARRAY_HEADER_SIZE: u64 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregatorConfig {
    pub array_header_size: u64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        AggregatorConfig {
            array_header_size: DEFAULT_ARRAY_HEADER_SIZE,
        }
    }
}

impl AggregatorConfig {
    // clamps at u64::MAX, the header size comes straight from the command line
    fn array_size(&self, number_of_elements: u32, element_size: u64) -> u64 {
        u64::from(number_of_elements)
            .saturating_mul(element_size)
            .saturating_add(self.array_header_size)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecordCounters {
    pub instances: u64,
    pub object_arrays: u64,
    pub primitive_arrays: u64,
}

impl RecordCounters {
    pub fn total(&self) -> u64 {
        self.instances + self.object_arrays + self.primitive_arrays
    }
}

pub fn primitive_array_name(element_type: FieldType) -> String {
    format!("{}[]", element_type.java_name())
}

/// An array class id resolves to an array name already, a plain class id gets the suffix.
pub fn object_array_name(class_name: &str) -> String {
    if class_name.ends_with("[]") {
        class_name.to_string()
    } else {
        format!("{class_name}[]")
    }
}

// ascending ids so that warnings come out in the same order on every run
fn sorted_by_id(stats_by_id: AHashMap<u64, ClassStats>) -> Vec<(u64, ClassStats)> {
    let mut sorted: Vec<_> = stats_by_id.into_iter().collect();
    sorted.sort_unstable_by_key(|(id, _)| *id);
    sorted
}

/// Second pass: counts instances and arrays per class id, names are only resolved once the
/// stream is drained.
pub struct InstanceAggregator<'a> {
    symbols: &'a SymbolTable,
    id_size: u32,
    config: AggregatorConfig,
    instances: AHashMap<u64, ClassStats>,
    object_arrays: AHashMap<u64, ClassStats>,
    primitive_arrays: AHashMap<FieldType, ClassStats>,
    counters: RecordCounters,
    diagnostics: Diagnostics,
    debug_mode: bool,
}

impl<'a> InstanceAggregator<'a> {
    pub fn new(symbols: &'a SymbolTable, config: AggregatorConfig, debug_mode: bool) -> Self {
        InstanceAggregator {
            symbols,
            id_size: symbols.id_size(),
            config,
            instances: AHashMap::new(),
            object_arrays: AHashMap::new(),
            primitive_arrays: AHashMap::new(),
            counters: RecordCounters::default(),
            diagnostics: Diagnostics::default(),
            debug_mode,
        }
    }

    // warns once per unknown class id
    fn resolve_class_name(&mut self, class_object_id: u64) -> Cow<'a, str> {
        let symbols: &'a SymbolTable = self.symbols;
        match symbols.class_name(class_object_id) {
            Some(name) => Cow::Borrowed(name),
            None => {
                self.diagnostics.record(
                    HprofHistoWarning::UnresolvedReference {
                        id: class_object_id,
                    },
                    self.debug_mode,
                );
                Cow::Owned(unresolved_name(class_object_id))
            }
        }
    }

    /// The field bytes must match the flattened class layout, the declared length is used otherwise.
    pub fn record_instance(&mut self, class_object_id: u64, data_size: u32) {
        let size = u64::from(data_size);
        if self.symbols.instance_size(class_object_id) != Some(size) {
            self.diagnostics.record(
                HprofHistoWarning::MissingClassLayout { class_object_id },
                self.debug_mode,
            );
        }
        self.instances
            .entry(class_object_id)
            .or_default()
            .add(1, size);
        self.counters.instances += 1;
    }

    pub fn record_object_array(&mut self, array_class_id: u64, number_of_elements: u32) {
        let size = self
            .config
            .array_size(number_of_elements, u64::from(self.id_size));
        self.object_arrays
            .entry(array_class_id)
            .or_default()
            .add(1, size);
        self.counters.object_arrays += 1;
    }

    pub fn record_primitive_array(&mut self, element_type: FieldType, number_of_elements: u32) {
        let size = self
            .config
            .array_size(number_of_elements, element_type.byte_size(self.id_size));
        self.primitive_arrays
            .entry(element_type)
            .or_default()
            .add(1, size);
        self.counters.primitive_arrays += 1;
    }

    fn on_gc_record(&mut self, gc_record: GcRecord) -> Result<(), HprofHistoError> {
        match gc_record {
            GcRecord::InstanceDump {
                class_object_id,
                data_size,
            } => self.record_instance(class_object_id, data_size),
            GcRecord::ObjectArrayDump {
                number_of_elements,
                array_class_id,
            } => self.record_object_array(array_class_id, number_of_elements),
            GcRecord::PrimitiveArrayDump {
                number_of_elements,
                element_type,
            } => self.record_primitive_array(element_type, number_of_elements),
            GcRecord::Root | GcRecord::ClassDump { .. } => (),
        }
        Ok(())
    }

    /// Resolves the class names and folds the per id counters into the histogram.
    pub fn finish(mut self) -> (ClassHistogram, RecordCounters, Diagnostics) {
        let mut histogram = ClassHistogram::new();
        for (class_object_id, stats) in sorted_by_id(mem::take(&mut self.instances)) {
            let class_name = self.resolve_class_name(class_object_id);
            histogram.record(&class_name, stats.instance_count, stats.total_bytes);
        }
        for (array_class_id, stats) in sorted_by_id(mem::take(&mut self.object_arrays)) {
            let class_name = object_array_name(&self.resolve_class_name(array_class_id));
            histogram.record(&class_name, stats.instance_count, stats.total_bytes);
        }
        for (element_type, stats) in &self.primitive_arrays {
            histogram.record(
                &primitive_array_name(*element_type),
                stats.instance_count,
                stats.total_bytes,
            );
        }
        (histogram, self.counters, self.diagnostics)
    }
}

impl RecordDispatch for InstanceAggregator<'_> {
    fn action_for(tag: RecordTag) -> RecordAction<Self> {
        match tag {
            RecordTag::HeapDump | RecordTag::HeapDumpSegment => {
                RecordAction::StreamSubRecords(Self::on_gc_record)
            }
            _ => RecordAction::Skip,
        }
    }
}

/// Runs the second pass over the whole stream.
pub fn aggregate_instances<R: Read>(
    reader: &mut RecordReader<R>,
    symbols: &SymbolTable,
    config: AggregatorConfig,
    debug_mode: bool,
) -> Result<(ClassHistogram, RecordCounters, Diagnostics), HprofHistoError> {
    let mut aggregator = InstanceAggregator::new(symbols, config, debug_mode);
    reader.dispatch_all(&mut aggregator)?;
    Ok(aggregator.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol_table::build_symbol_table;
    use crate::test_utils::{GcSegmentBuilder, HprofBuilder};

    fn symbols(bytes: &[u8]) -> SymbolTable {
        let mut reader = RecordReader::new(bytes, false).unwrap();
        build_symbol_table(&mut reader, false).unwrap().0
    }

    fn run(bytes: &[u8], config: AggregatorConfig) -> (ClassHistogram, RecordCounters, Diagnostics) {
        let symbols = symbols(bytes);
        let mut reader = RecordReader::new(bytes, false).unwrap();
        aggregate_instances(&mut reader, &symbols, config, false).unwrap()
    }

    fn stats(instance_count: u64, total_bytes: u64) -> Option<ClassStats> {
        Some(ClassStats {
            instance_count,
            total_bytes,
        })
    }

    #[test]
    fn object_array_of_widgets() {
        let bytes = HprofBuilder::new(8)
            .string(1, "Widget")
            .load_class(1, 100, 1)
            .build();
        let symbols = symbols(&bytes);
        let config = AggregatorConfig {
            array_header_size: 16,
        };
        let mut aggregator = InstanceAggregator::new(&symbols, config, false);
        aggregator.record_object_array(100, 10);
        let (histogram, counters, diagnostics) = aggregator.finish();
        assert_eq!(histogram.get("Widget[]"), stats(1, 96));
        assert_eq!(histogram.get("Widget"), None);
        assert_eq!(counters.object_arrays, 1);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn array_class_ids_keep_their_name() {
        assert_eq!(object_array_name("java.lang.String[]"), "java.lang.String[]");
        assert_eq!(object_array_name("java.lang.String"), "java.lang.String[]");
        assert_eq!(object_array_name("<unresolved:3>"), "<unresolved:3>[]");
    }

    #[test]
    fn primitive_arrays_with_configured_overhead() {
        let symbols = SymbolTable::new(4);
        let config = AggregatorConfig {
            array_header_size: 12,
        };
        let mut aggregator = InstanceAggregator::new(&symbols, config, false);
        aggregator.record_primitive_array(FieldType::Int, 3);
        aggregator.record_primitive_array(FieldType::Int, 0);
        aggregator.record_primitive_array(FieldType::Bool, 5);
        let (histogram, counters, _) = aggregator.finish();
        assert_eq!(histogram.get("int[]"), stats(2, 3 * 4 + 12 + 12));
        assert_eq!(histogram.get("boolean[]"), stats(1, 5 + 12));
        assert_eq!(counters.primitive_arrays, 3);
    }

    #[test]
    fn instance_size_from_field_layout() {
        // Point extends Base: Point { int x; Object next } Base { long id }
        let segment = GcSegmentBuilder::new(4)
            .class_dump(10, 0, &[FieldType::Long])
            .class_dump(20, 10, &[FieldType::Int, FieldType::Object])
            .instance_dump(1000, 20, &[0; 16])
            .instance_dump(1001, 20, &[0; 16])
            .build();
        let bytes = HprofBuilder::new(4)
            .string(1, "com/acme/Point")
            .load_class(1, 20, 1)
            .heap_dump_segment(&segment)
            .build();
        let (histogram, counters, diagnostics) = run(&bytes, AggregatorConfig::default());
        assert_eq!(histogram.get("com.acme.Point"), stats(2, 32));
        assert_eq!(counters.instances, 2);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn unknown_class_falls_back_to_placeholder() {
        let segment = GcSegmentBuilder::new(8)
            .instance_dump(1000, 404, &[0; 6])
            .object_array_dump(1001, 405, 2)
            .build();
        let bytes = HprofBuilder::new(8).heap_dump_segment(&segment).build();
        let (histogram, counters, diagnostics) = run(&bytes, AggregatorConfig::default());
        assert_eq!(histogram.get("<unresolved:404>"), stats(1, 6));
        assert_eq!(histogram.get("<unresolved:405>[]"), stats(1, 2 * 8 + 16));
        assert_eq!(counters.total(), 2);
        assert_eq!(diagnostics.unresolved_references, 2);
        assert_eq!(diagnostics.missing_class_layouts, 1);
    }

    #[test]
    fn layout_not_matching_field_bytes_uses_declared_size() {
        let segment = GcSegmentBuilder::new(8)
            .class_dump(10, 0, &[FieldType::Int])
            .instance_dump(1000, 10, &[0; 9])
            .build();
        let bytes = HprofBuilder::new(8)
            .string(1, "Odd")
            .load_class(1, 10, 1)
            .heap_dump(&segment)
            .build();
        let (histogram, _, diagnostics) = run(&bytes, AggregatorConfig::default());
        assert_eq!(histogram.get("Odd"), stats(1, 9));
        assert_eq!(
            diagnostics.samples,
            vec![HprofHistoWarning::MissingClassLayout {
                class_object_id: 10
            }]
        );
    }

    #[test]
    fn instance_total_matches_sub_records() {
        let first = GcSegmentBuilder::new(8)
            .root_sticky_class(10)
            .class_dump(10, 0, &[FieldType::Short])
            .instance_dump(1, 10, &[0; 2])
            .instance_dump(2, 10, &[0; 2])
            .primitive_array_dump(3, FieldType::Byte, 100)
            .build();
        let second = GcSegmentBuilder::new(8)
            .root_jni_global(2)
            .object_array_dump(4, 11, 1)
            .primitive_array_dump(5, FieldType::Double, 2)
            .instance_dump(6, 10, &[0; 2])
            .build();
        let bytes = HprofBuilder::new(8)
            .string(1, "java/lang/Short")
            .string(2, "[Ljava/lang/Short;")
            .load_class(1, 10, 1)
            .load_class(2, 11, 2)
            .heap_dump_segment(&first)
            .heap_dump_segment(&second)
            .heap_dump_end()
            .build();
        let (histogram, counters, diagnostics) = run(&bytes, AggregatorConfig::default());
        assert_eq!(counters.instances, 3);
        assert_eq!(counters.object_arrays, 1);
        assert_eq!(counters.primitive_arrays, 2);
        assert_eq!(histogram.total_instances(), counters.total());
        assert_eq!(histogram.get("java.lang.Short"), stats(3, 6));
        assert_eq!(histogram.get("java.lang.Short[]"), stats(1, 8 + 16));
        assert_eq!(histogram.get("byte[]"), stats(1, 100 + 16));
        assert_eq!(histogram.get("double[]"), stats(1, 16 + 16));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn no_heap_dump_gives_empty_histogram() {
        let bytes = HprofBuilder::new(8)
            .string(1, "java/lang/Object")
            .load_class(1, 10, 1)
            .build();
        let (histogram, counters, _) = run(&bytes, AggregatorConfig::default());
        assert!(histogram.is_empty());
        assert_eq!(counters.total(), 0);
    }

    #[test]
    fn unknown_class_warns_once_per_id() {
        let segment = GcSegmentBuilder::new(8)
            .instance_dump(1, 404, &[0; 4])
            .instance_dump(2, 404, &[0; 4])
            .instance_dump(3, 404, &[0; 4])
            .build();
        let bytes = HprofBuilder::new(8).heap_dump_segment(&segment).build();
        let (histogram, _, diagnostics) = run(&bytes, AggregatorConfig::default());
        assert_eq!(histogram.get("<unresolved:404>"), stats(3, 12));
        assert_eq!(diagnostics.unresolved_references, 1);
        assert_eq!(diagnostics.missing_class_layouts, 3);
    }

    #[test]
    fn class_ids_sharing_a_name_share_a_row() {
        // two class loaders loading the same class
        let bytes = HprofBuilder::new(8)
            .string(1, "com/acme/Widget")
            .load_class(1, 100, 1)
            .load_class(2, 101, 1)
            .build();
        let symbols = symbols(&bytes);
        let mut aggregator = InstanceAggregator::new(&symbols, AggregatorConfig::default(), false);
        aggregator.record_instance(100, 8);
        aggregator.record_instance(101, 8);
        aggregator.record_object_array(100, 1);
        aggregator.record_object_array(101, 1);
        let (histogram, counters, _) = aggregator.finish();
        assert_eq!(histogram.get("com.acme.Widget"), stats(2, 16));
        assert_eq!(histogram.get("com.acme.Widget[]"), stats(2, 2 * (8 + 16)));
        assert_eq!(histogram.total_instances(), counters.total());
    }

    #[test]
    fn huge_array_header_size_saturates() {
        let symbols = SymbolTable::new(8);
        let config = AggregatorConfig {
            array_header_size: u64::MAX,
        };
        let mut aggregator = InstanceAggregator::new(&symbols, config, false);
        aggregator.record_primitive_array(FieldType::Int, 1);
        aggregator.record_primitive_array(FieldType::Int, u32::MAX);
        aggregator.record_object_array(100, u32::MAX);
        let (histogram, counters, _) = aggregator.finish();
        assert_eq!(histogram.get("int[]"), stats(2, u64::MAX));
        assert_eq!(histogram.get("<unresolved:100>[]"), stats(1, u64::MAX));
        assert_eq!(histogram.total_bytes(), u64::MAX);
        assert_eq!(counters.total(), 3);
    }
}
