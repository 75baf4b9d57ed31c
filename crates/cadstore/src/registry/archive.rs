//! Loading and saving a registry through the chunk protocol.
//!
//! ```text
//! magic "CADSTORE", archive_version i32
//! START_SECTION 1.0    archive_version i32, application text
//! PROPERTIES 1.0       model properties
//! SETTINGS 1.x         1.0 fields, tagged items from 1.1
//! <TYPE>_TABLE 1.0     COMPONENT_RECORD chunks, one table per type
//! USER_STRINGS 1.0     count u32, (key, value) text pairs
//! END_OF_FILE (plain)  total archive length u64
//! ```
//!
//! Reading is tolerant: a table or record that fails to parse is counted
//! in the [`ReadReport`] and loading continues at the next chunk
//! boundary. Only a stream that is not an archive, or a missing start
//! section, fails the whole read.

use rustc_hash::FxHashMap;

use crate::codec::tcode::{
    TCODE_END_OF_FILE, TCODE_PROPERTIES, TCODE_SETTINGS, TCODE_START_SECTION, TCODE_USER_STRINGS,
    table_code, table_type,
};
use crate::codec::{
    ArchiveReader, ArchiveVersion, ArchiveWriter, ChunkHeader, ChunkVersion, ReferenceIndexer,
    ReferenceResolver, read_component, write_component,
};
use crate::error::{ErrorCode, ReadError, WriteError};
use crate::limits::{MAX_CHUNK_DEPTH, MAX_USER_STRINGS};
use crate::manifest::system::system_items_of;
use crate::manifest::{Manifest, ManifestMap};
use crate::model::{
    Component, ComponentType, Id, ModelProperties, ModelSettings, NIL_ID, UNSET_INDEX, UnitSystem,
    is_nil,
};
use crate::registry::{ComponentRef, Registry, parents_first, remap_parent};

const START_SECTION_VERSION: ChunkVersion = ChunkVersion::new(1, 0);
const PROPERTIES_VERSION: ChunkVersion = ChunkVersion::new(1, 0);
const TABLE_VERSION: ChunkVersion = ChunkVersion::new(1, 0);
const USER_STRINGS_VERSION: ChunkVersion = ChunkVersion::new(1, 0);
const SETTINGS_MAJOR: i32 = 1;

// Settings tagged items (1.1)
const SETTINGS_ITEM_CURRENT_LAYER: u8 = 1;

// =============================================================================
// OPTIONS AND REPORTS
// =============================================================================

/// Options for [`Registry::read`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOptions {
    /// Resolve id and name collisions instead of rejecting the record.
    pub resolve_conflicts: bool,
    /// Maximum chunk nesting depth.
    pub max_depth: usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            resolve_conflicts: true,
            max_depth: MAX_CHUNK_DEPTH,
        }
    }
}

impl ReadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options that reject colliding records instead of renaming them.
    pub fn strict() -> Self {
        Self {
            resolve_conflicts: false,
            ..Self::default()
        }
    }
}

/// Options for [`Registry::write`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WriteOptions {
    /// Archive generation to write.
    pub target: ArchiveVersion,
    /// Name of the writing application, stored in the start section.
    pub application: String,
}

impl WriteOptions {
    /// Options targeting [`ArchiveVersion::CURRENT`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Options targeting an older (or the current) generation.
    pub fn target(target: ArchiveVersion) -> Self {
        Self {
            target,
            ..Self::default()
        }
    }

    pub fn with_application(mut self, application: impl Into<String>) -> Self {
        self.application = application.into();
        self
    }
}

/// How bad a [`ReadIssue`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Something was skipped or defaulted; the model is complete otherwise.
    Warning,
    /// One record or document table was lost.
    Error,
    /// A whole table (or the rest of the stream) was lost.
    Failure,
}

/// One problem met while reading.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadIssue {
    pub severity: Severity,
    /// Component table the problem occurred in, if any.
    pub table: Option<ComponentType>,
    pub code: Option<ErrorCode>,
    pub message: String,
}

/// Outcome of a tolerant read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadReport {
    /// Version number stored in the archive header.
    pub archive_version: i32,
    /// Application recorded by the writer.
    pub application: String,
    pub failure_count: usize,
    pub error_count: usize,
    pub warning_count: usize,
    /// Cross-references that did not land on a live component and were
    /// set to nil.
    pub unresolved_references: usize,
    /// Records admitted under a different id, name or index.
    pub conflicts_resolved: usize,
    /// Unknown chunks skipped.
    pub skipped_chunks: usize,
    /// Components admitted.
    pub loaded: usize,
    pub issues: Vec<ReadIssue>,
}

impl ReadReport {
    /// True when no table was lost.
    pub fn is_success(&self) -> bool {
        self.failure_count == 0
    }

    /// True when nothing at all was reported.
    pub fn is_clean(&self) -> bool {
        self.failure_count == 0 && self.error_count == 0 && self.warning_count == 0
    }

    fn record(&mut self, severity: Severity, table: Option<ComponentType>, code: Option<ErrorCode>, message: String) {
        match severity {
            Severity::Warning => self.warning_count += 1,
            Severity::Error => self.error_count += 1,
            Severity::Failure => self.failure_count += 1,
        }
        tracing::warn!(?severity, table = ?table, code = code.map(|c| c.code()), "{message}");
        self.issues.push(ReadIssue {
            severity,
            table,
            code,
            message,
        });
    }

    fn warn(&mut self, table: Option<ComponentType>, message: impl Into<String>) {
        self.record(Severity::Warning, table, None, message.into());
    }

    fn error(&mut self, table: Option<ComponentType>, error: &ReadError) {
        self.record(Severity::Error, table, Some(error.code()), error.to_string());
    }

    fn fail(&mut self, table: Option<ComponentType>, error: &ReadError) {
        self.record(Severity::Failure, table, Some(error.code()), error.to_string());
    }
}

// =============================================================================
// REFERENCE INDEXING
// =============================================================================

impl ReferenceIndexer for Manifest {
    fn index_of(&self, component_type: ComponentType, id: &Id) -> i32 {
        Manifest::index_of(self, component_type, id)
    }
}

/// Per-read state: file index to runtime id, for index-based references.
#[derive(Debug, Default)]
struct LoadContext {
    indices: FxHashMap<(ComponentType, i32), Id>,
    unresolved: usize,
}

impl ReferenceResolver for LoadContext {
    fn resolve_index(&mut self, component_type: ComponentType, index: i32) -> Id {
        if index == UNSET_INDEX {
            return NIL_ID;
        }
        let found = if index < 0 {
            system_items_of(component_type)
                .find(|item| item.index() == index)
                .map(|item| *item.id())
        } else {
            self.indices.get(&(component_type, index)).copied()
        };
        found.unwrap_or_else(|| {
            self.unresolved += 1;
            NIL_ID
        })
    }
}

// =============================================================================
// READING
// =============================================================================

/// Where a read is in the stream, and what it has loaded so far.
struct LoadState {
    context: LoadContext,
    map: ManifestMap,
    loaded: Vec<ComponentRef>,
    /// Current layer stored by index (settings 1.0), resolved after the
    /// tables are in.
    current_layer_index: Option<i32>,
}

impl Registry {
    /// Reads an archive into this registry.
    ///
    /// Components are admitted next to whatever the registry already
    /// holds; with `resolve_conflicts` on, colliding records are renamed
    /// or re-identified and every cross-reference read from the archive
    /// follows them.
    pub fn read(&mut self, r: &mut ArchiveReader<'_>, options: &ReadOptions) -> Result<ReadReport, ReadError> {
        let mut report = ReadReport {
            archive_version: r.stored_version(),
            ..ReadReport::default()
        };
        let stored_version = r.stored_version();
        report.application = r.read_expected_chunk(TCODE_START_SECTION, |r, header| {
            header.check_major(START_SECTION_VERSION.major)?;
            let version = r.read_i32("start section archive version")?;
            if version != stored_version {
                tracing::debug!(header = stored_version, start_section = version, "archive versions disagree");
            }
            r.read_string("application name")
        })?;
        tracing::debug!(version = report.archive_version, application = %report.application, "reading archive");

        let mut state = LoadState {
            context: LoadContext::default(),
            map: ManifestMap::new(),
            loaded: Vec::new(),
            current_layer_index: None,
        };

        loop {
            let Some(type_code) = r.peek_type_code() else {
                report.warn(None, "archive ends without an end-of-file chunk");
                break;
            };
            let before = r.position();
            if type_code == TCODE_END_OF_FILE {
                self.read_end_of_file(r, &mut report);
                break;
            }
            match type_code {
                TCODE_PROPERTIES => {
                    if let Err(e) = r.read_chunk(read_properties).map(|p| self.properties = p) {
                        report.error(None, &e);
                    }
                }
                TCODE_SETTINGS => match r.read_chunk(read_settings) {
                    Ok((settings, layer_index)) => {
                        self.settings = settings;
                        state.current_layer_index = layer_index;
                    }
                    Err(e) => report.error(None, &e),
                },
                TCODE_USER_STRINGS => {
                    if let Err(e) = self.read_user_strings(r) {
                        report.error(None, &e);
                    }
                }
                code => match table_type(code) {
                    Some(ty) => {
                        if let Err(e) = self.read_table(r, ty, options, &mut state, &mut report) {
                            report.fail(Some(ty), &e);
                        }
                    }
                    None => match r.read_chunk(|_, _| Ok(())) {
                        Ok(()) => {
                            report.skipped_chunks += 1;
                            report.warn(None, format!("skipped unknown chunk {code:#010x}"));
                        }
                        Err(e) => report.fail(None, &e),
                    },
                },
            }
            if r.position() == before {
                report.fail(
                    None,
                    &ReadError::ChunkNestingMismatch {
                        context: "no progress at top level",
                    },
                );
                break;
            }
        }

        self.finish_load(state, &mut report);
        self.content_version += 1;
        tracing::debug!(
            loaded = report.loaded,
            failures = report.failure_count,
            errors = report.error_count,
            warnings = report.warning_count,
            "archive read"
        );
        Ok(report)
    }

    fn read_end_of_file(&mut self, r: &mut ArchiveReader<'_>, report: &mut ReadReport) {
        match r.read_chunk(|r, _| r.read_u64("archive length")) {
            Ok(total) if total != r.position() as u64 => {
                report.warn(None, format!("end-of-file length {total} does not match stream position {}", r.position()));
            }
            Ok(_) => {}
            Err(e) => report.error(None, &e),
        }
    }

    fn read_user_strings(&mut self, r: &mut ArchiveReader<'_>) -> Result<(), ReadError> {
        let entries = r.read_chunk(|r, header| {
            header.check_major(USER_STRINGS_VERSION.major)?;
            let count = r.read_u32("user string count")? as usize;
            if count > MAX_USER_STRINGS {
                return Err(ReadError::LengthExceedsLimit {
                    field: "user strings",
                    len: count,
                    max: MAX_USER_STRINGS,
                });
            }
            let mut entries = Vec::with_capacity(count);
            for _ in 0..count {
                let key = r.read_string("user string key")?;
                let value = r.read_string("user string value")?;
                entries.push((key, value));
            }
            Ok(entries)
        })?;
        for (key, value) in entries {
            self.user_strings.set(key, value);
        }
        Ok(())
    }

    /// Reads one component table. Record failures are counted and
    /// skipped; the error returned is for the table chunk itself.
    fn read_table(
        &mut self,
        r: &mut ArchiveReader<'_>,
        ty: ComponentType,
        options: &ReadOptions,
        state: &mut LoadState,
        report: &mut ReadReport,
    ) -> Result<(), ReadError> {
        let mut records = Vec::new();
        let result = r.read_chunk(|r, header| {
            header.check_major(TABLE_VERSION.major)?;
            tracing::debug!(table = %ty, "reading table");
            while !r.at_chunk_end() {
                let before = r.position();
                match read_component(r, ty, &mut state.context) {
                    Ok(component) => records.push(component),
                    Err(e) => report.error(Some(ty), &e),
                }
                if r.position() == before {
                    break;
                }
            }
            Ok(())
        });
        // records read before a damaged tail are still loaded
        for mut component in parents_first(records) {
            remap_parent(&mut component, &state.map);
            self.load_component(component, options, state, report);
        }
        result
    }

    fn load_component(
        &mut self,
        component: Component,
        options: &ReadOptions,
        state: &mut LoadState,
        report: &mut ReadReport,
    ) {
        let ty = component.component_type();
        let file_index = component.index();
        if self.manifest.is_system(ty, component.id()) || (file_index < 0 && file_index != UNSET_INDEX) {
            report.warn(Some(ty), format!("ignored stored system component {:?}", component.name()));
            return;
        }

        match self.admit(component, options.resolve_conflicts, Some(&mut state.map)) {
            Ok(reference) => {
                let id = reference.id().unwrap_or(NIL_ID);
                if ty.is_indexed() && file_index != UNSET_INDEX {
                    state.context.indices.insert((ty, file_index), id);
                }
                let remapped = self
                    .manifest
                    .item_from_id(ty, &id)
                    .is_some_and(|item| item.original().is_some());
                if remapped {
                    report.conflicts_resolved += 1;
                }
                report.loaded += 1;
                state.loaded.push(reference);
            }
            Err(e) => report.error(Some(ty), &ReadError::from(e)),
        }
    }

    /// Rewrites the references of everything just loaded through the
    /// read's manifest map, then keeps the map.
    fn finish_load(&mut self, state: LoadState, report: &mut ReadReport) {
        let LoadState {
            mut context,
            map,
            loaded,
            current_layer_index,
        } = state;

        let mut unresolved = 0;
        for reference in &loaded {
            match self.remap_references(reference, &map) {
                Ok(count) => unresolved += count,
                Err(e) => report.record(Severity::Error, reference.component_type(), Some(e.code()), e.to_string()),
            }
        }

        let current_layer = match current_layer_index {
            Some(index) => context.resolve_index(ComponentType::Layer, index),
            None => self.settings.current_layer_id,
        };
        self.settings.current_layer_id = if is_nil(&current_layer) {
            NIL_ID
        } else {
            map.get_and_validate_destination_id(ComponentType::Layer, &current_layer, &self.manifest)
                .unwrap_or_else(|| {
                    unresolved += 1;
                    NIL_ID
                })
        };

        unresolved += context.unresolved;
        if unresolved > 0 {
            report.unresolved_references += unresolved;
            report.record(
                Severity::Warning,
                None,
                Some(ErrorCode::UnresolvedReference),
                format!("{unresolved} cross-reference(s) could not be resolved and were cleared"),
            );
        }

        for item in map.iter() {
            if let Err(e) = self.manifest_map.add_pair(*item.source(), *item.destination()) {
                tracing::debug!(error = %e, "manifest map pair not kept");
            }
        }
    }

    // =========================================================================
    // WRITING
    // =========================================================================

    /// Writes the registry at the writer's target version.
    ///
    /// Deleted and system components are not written. Tables of types
    /// newer than the target are omitted.
    pub fn write(&self, w: &mut ArchiveWriter, options: &WriteOptions) -> Result<(), WriteError> {
        let target = w.version();
        tracing::debug!(%target, "writing archive");

        w.write_chunk(TCODE_START_SECTION, START_SECTION_VERSION, |w| {
            w.write_i32(target.as_i32());
            w.write_string("application name", &options.application)
        })?;
        w.write_chunk(TCODE_PROPERTIES, PROPERTIES_VERSION, |w| write_properties(w, &self.properties))?;
        let settings_version = SettingsSchema::for_target(target).version();
        w.write_chunk(TCODE_SETTINGS, settings_version, |w| {
            write_settings(w, &self.settings, &self.manifest)
        })?;

        for ty in ComponentType::ALL {
            if target < ty.min_archive_version() {
                tracing::debug!(table = %ty, %target, "table omitted for target version");
                continue;
            }
            w.write_chunk(table_code(ty), TABLE_VERSION, |w| {
                for reference in self.components(ty) {
                    let Some(component) = reference.component() else { continue };
                    write_component(w, &component, &self.manifest)?;
                }
                Ok(())
            })?;
        }

        w.write_chunk(TCODE_USER_STRINGS, USER_STRINGS_VERSION, |w| {
            w.write_u32(self.user_strings.len() as u32);
            for (key, value) in self.user_strings.iter() {
                w.write_string("user string key", key)?;
                w.write_string("user string value", value)?;
            }
            Ok(())
        })?;

        let eof = w.begin_write_plain_chunk(TCODE_END_OF_FILE);
        w.write_u64((w.position() + 8) as u64);
        w.end_write_chunk(eof)
    }

    /// Serializes the registry into a new buffer.
    pub fn to_bytes(&self, options: &WriteOptions) -> Result<Vec<u8>, WriteError> {
        let mut w = ArchiveWriter::new(options.target);
        self.write(&mut w, options)?;
        w.finish()
    }

    /// Reads an archive into a new registry.
    pub fn from_bytes(data: &[u8], options: &ReadOptions) -> Result<(Registry, ReadReport), ReadError> {
        let mut r = ArchiveReader::open(data)?.with_max_depth(options.max_depth);
        let mut registry = Registry::new();
        let report = registry.read(&mut r, options)?;
        Ok((registry, report))
    }
}

// =============================================================================
// DOCUMENT TABLES
// =============================================================================

fn write_properties(w: &mut ArchiveWriter, p: &ModelProperties) -> Result<(), WriteError> {
    w.write_string("application name", &p.application_name)?;
    w.write_string("application url", &p.application_url)?;
    w.write_string("created by", &p.created_by)?;
    w.write_string("last edited by", &p.last_edited_by)?;
    w.write_i32(p.revision_count);
    w.write_string("notes", &p.notes)
}

fn read_properties(r: &mut ArchiveReader<'_>, header: &ChunkHeader) -> Result<ModelProperties, ReadError> {
    header.check_major(PROPERTIES_VERSION.major)?;
    Ok(ModelProperties {
        application_name: r.read_string("application name")?,
        application_url: r.read_string("application url")?,
        created_by: r.read_string("created by")?,
        last_edited_by: r.read_string("last edited by")?,
        revision_count: r.read_i32("revision count")?,
        notes: r.read_string("notes")?,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SettingsSchema {
    /// 1.0: units, tolerances, current layer by index.
    Indexed,
    /// 1.1: tagged items, current layer by id.
    Tagged,
}

impl SettingsSchema {
    fn for_target(target: ArchiveVersion) -> Self {
        if target >= ArchiveVersion::V5 {
            SettingsSchema::Tagged
        } else {
            SettingsSchema::Indexed
        }
    }

    fn from_minor(minor: i32) -> Self {
        if minor >= 1 {
            SettingsSchema::Tagged
        } else {
            SettingsSchema::Indexed
        }
    }

    fn version(self) -> ChunkVersion {
        match self {
            SettingsSchema::Indexed => ChunkVersion::new(SETTINGS_MAJOR, 0),
            SettingsSchema::Tagged => ChunkVersion::new(SETTINGS_MAJOR, 1),
        }
    }
}

fn write_settings(w: &mut ArchiveWriter, s: &ModelSettings, manifest: &Manifest) -> Result<(), WriteError> {
    w.write_u8(s.unit_system as u8);
    w.write_f64(s.absolute_tolerance);
    w.write_f64(s.angle_tolerance);
    w.write_f64(s.relative_tolerance);
    w.write_i32(manifest.index_of(ComponentType::Layer, &s.current_layer_id));
    match SettingsSchema::for_target(w.version()) {
        SettingsSchema::Indexed => {}
        SettingsSchema::Tagged => {
            if !is_nil(&s.current_layer_id) {
                w.write_item_id(SETTINGS_ITEM_CURRENT_LAYER)?;
                w.write_id(&s.current_layer_id);
            }
            w.write_items_end();
        }
    }
    Ok(())
}

/// Returns the settings and, for 1.0 chunks, the current layer index
/// still to be resolved.
fn read_settings(r: &mut ArchiveReader<'_>, header: &ChunkHeader) -> Result<(ModelSettings, Option<i32>), ReadError> {
    let schema = SettingsSchema::from_minor(header.check_major(SETTINGS_MAJOR)?);
    let unit = r.read_u8("unit system")?;
    let unit_system = UnitSystem::from_u8(unit).ok_or(ReadError::InvalidTag {
        field: "unit system",
        value: unit as u32,
    })?;
    let mut settings = ModelSettings {
        unit_system,
        absolute_tolerance: r.read_f64("absolute tolerance")?,
        angle_tolerance: r.read_f64("angle tolerance")?,
        relative_tolerance: r.read_f64("relative tolerance")?,
        current_layer_id: NIL_ID,
    };
    let layer_index = r.read_i32("current layer index")?;

    match schema {
        SettingsSchema::Indexed => Ok((settings, Some(layer_index))),
        SettingsSchema::Tagged => {
            while let Some(item) = r.read_item_id()? {
                match item {
                    SETTINGS_ITEM_CURRENT_LAYER => settings.current_layer_id = r.read_id("current layer id")?,
                    other => {
                        tracing::debug!(item = other, "unknown settings item, skipping the rest");
                        break;
                    }
                }
            }
            Ok((settings, None))
        }
    }
}
