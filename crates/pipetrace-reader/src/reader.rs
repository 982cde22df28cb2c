//! Commit trace reader.
//!
//! Rows come out of the `LifeTimeCommitTrace` table written by the simulator
//! instrumentation. The first column is the sequence id; after it, every
//! column whose name starts with `at` is a stage timestamp (in stage order),
//! the `pc*` column is the program counter and the `disasm*` column is either
//! decoded text or a raw instruction word.

use crate::disasm::{DisasmCache, Disassembler};
use itertools::Itertools;
use log::{debug, info};
use pipetrace_core::progress::progress_bar;
use pipetrace_core::{
    Error, GapMode, InstRecord, ReaderConfig, Result, TimingProfile, TimingVector, STAGE_COUNT,
};
use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection, OpenFlags, Row};
use std::path::Path;

/// Table holding one row per committed instruction.
pub const TRACE_TABLE: &str = "LifeTimeCommitTrace";

/// Stage timestamp used for tick range filtering.
pub const COMMIT_COLUMN: &str = "AtCommit";

/// Everything derived from one read of the trace.
#[derive(Debug, Clone)]
pub struct TraceData {
    /// Instruction identities in commit order.
    pub records: Vec<InstRecord>,
    /// Timing vectors, index-aligned with `records`.
    pub timings: Vec<TimingVector>,
    /// Mean timing per (pc, mnemonic).
    pub profile: TimingProfile,
    pub gap: GapMode,
}

impl TraceData {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Stage,
    Pc,
    Inst,
    Ignored,
}

impl ColumnKind {
    fn classify(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if lower.starts_with("at") {
            ColumnKind::Stage
        } else if lower.starts_with("pc") {
            ColumnKind::Pc
        } else if lower.starts_with("disasm") {
            ColumnKind::Inst
        } else {
            ColumnKind::Ignored
        }
    }
}

/// Column positions resolved from the query's result set.
#[derive(Debug)]
struct Layout {
    names: Vec<String>,
    stages: Vec<usize>,
    pc: usize,
    inst: usize,
}

impl Layout {
    fn from_names(names: Vec<String>) -> Result<Self> {
        let mut stages = Vec::with_capacity(STAGE_COUNT);
        let mut pc = None;
        let mut inst = None;

        // Column 0 is the sequence id.
        for (idx, name) in names.iter().enumerate().skip(1) {
            match ColumnKind::classify(name) {
                ColumnKind::Stage => stages.push(idx),
                ColumnKind::Pc => pc = pc.or(Some(idx)),
                ColumnKind::Inst => inst = inst.or(Some(idx)),
                ColumnKind::Ignored => {}
            }
        }

        if stages.len() != STAGE_COUNT {
            return Err(Error::Schema(format!(
                "expected {} stage timestamp columns, found {}",
                STAGE_COUNT,
                stages.len()
            )));
        }
        let pc = pc.ok_or_else(|| Error::Schema("no program counter column".into()))?;
        let inst = inst.ok_or_else(|| Error::Schema("no instruction column".into()))?;

        Ok(Self {
            names,
            stages,
            pc,
            inst,
        })
    }

    fn integer(&self, row: &Row<'_>, idx: usize) -> Result<i64> {
        match row.get_ref(idx)? {
            ValueRef::Integer(value) => Ok(value),
            other => Err(Error::Schema(format!(
                "column {} holds {}, expected an integer",
                self.names[idx],
                other.data_type()
            ))),
        }
    }

    fn extract(&self, row: &Row<'_>) -> Result<RawRow> {
        let stamps = self
            .stages
            .iter()
            .map(|&idx| self.integer(row, idx))
            .collect::<Result<Vec<_>>>()?;
        let pc = self.integer(row, self.pc)?;
        let inst = match row.get_ref(self.inst)? {
            ValueRef::Text(bytes) => RawInst::Text(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Integer(word) => RawInst::Word(word as u64),
            other => {
                return Err(Error::Schema(format!(
                    "column {} holds {}, expected text or an instruction word",
                    self.names[self.inst],
                    other.data_type()
                )))
            }
        };
        Ok(RawRow { stamps, pc, inst })
    }
}

enum RawInst {
    Text(String),
    Word(u64),
}

struct RawRow {
    stamps: Vec<i64>,
    pc: i64,
    inst: RawInst,
}

/// Reads and normalizes a commit trace.
///
/// The reader owns its disassembly cache, so a word is decoded at most once
/// per reader no matter how often it is committed.
pub struct TraceReader<D> {
    conn: Connection,
    config: ReaderConfig,
    disasm: DisasmCache<D>,
    progress: bool,
}

impl<D: Disassembler> TraceReader<D> {
    /// Open a trace database read-only.
    pub fn open(path: impl AsRef<Path>, config: ReaderConfig, disassembler: D) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path.as_ref(),
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self::from_connection(conn, config, disassembler))
    }

    pub fn from_connection(conn: Connection, config: ReaderConfig, disassembler: D) -> Self {
        Self {
            conn,
            config,
            disasm: DisasmCache::new(disassembler),
            progress: false,
        }
    }

    /// Show a progress bar while rows are normalized.
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn disasm_cache(&self) -> &DisasmCache<D> {
        &self.disasm
    }

    /// Run the query and derive records, timing vectors and the profile.
    pub fn read(&mut self) -> Result<TraceData> {
        let ticks = self.config.ticks;
        match ticks.end {
            Some(end) => info!("Reading commits in ticks [{}, {}]", ticks.start, end),
            None => info!("Reading commits from tick {}", ticks.start),
        }

        let rows = self.query()?;
        info!("Fetched {} trace rows", rows.len());

        let (records, timings) = self.normalize(rows)?;
        if self.config.decode.requires_decode() {
            debug!("Decoded {} distinct instruction words", self.disasm.len());
        }

        let gap = self.config.gap;
        let (records, timings) = apply_gap(gap, records, timings)?;
        debug!("{} timing vectors after {} differencing", timings.len(), gap.name());

        let profile = TimingProfile::build(&records, &timings)?;
        Ok(TraceData {
            records,
            timings,
            profile,
            gap,
        })
    }

    fn query(&self) -> Result<Vec<RawRow>> {
        let mut sql = format!("SELECT * FROM {TRACE_TABLE} WHERE {COMMIT_COLUMN} >= ?");
        let mut bounds = vec![self.config.ticks.start];
        if let Some(end) = self.config.ticks.end {
            sql.push_str(&format!(" AND {COMMIT_COLUMN} <= ?"));
            bounds.push(end);
        }
        sql.push_str(" ORDER BY ID ASC");
        if let Some(limit) = self.config.limit {
            sql.push_str(" LIMIT ?");
            bounds.push(i64::try_from(limit).unwrap_or(i64::MAX));
        }
        debug!("{}", sql);

        let mut stmt = self.conn.prepare(&sql)?;
        let names = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>();
        let layout = Layout::from_names(names)?;

        let mut rows = stmt.query(params_from_iter(bounds))?;
        let mut raw = Vec::new();
        while let Some(row) = rows.next()? {
            raw.push(layout.extract(row)?);
        }
        Ok(raw)
    }

    fn normalize(&mut self, rows: Vec<RawRow>) -> Result<(Vec<InstRecord>, Vec<TimingVector>)> {
        let bar = progress_bar(rows.len() as u64, "Reading DB", self.progress);
        let period = self.config.period;
        let decode = self.config.decode.requires_decode();

        let mut records = Vec::with_capacity(rows.len());
        let mut timings = Vec::with_capacity(rows.len());
        for row in rows {
            let asm = match row.inst {
                RawInst::Text(text) => text,
                RawInst::Word(word) if decode => self.disasm.lookup(word)?.to_string(),
                RawInst::Word(word) => {
                    return Err(Error::Schema(format!(
                        "instruction column holds raw word {:#x} but decoding is disabled",
                        word
                    )))
                }
            };
            records.push(InstRecord::new(InstRecord::pc_from_stored(row.pc), asm));
            timings.push(row.stamps.iter().map(|&tick| period.to_cycles(tick)).collect());
            bar.inc(1);
        }
        bar.finish_and_clear();

        Ok((records, timings))
    }
}

/// Difference each stage between consecutive instructions.
fn inter_gaps(timings: &[TimingVector]) -> Vec<TimingVector> {
    timings
        .iter()
        .tuple_windows()
        .map(|(prev, next)| next.iter().zip(prev).map(|(n, p)| n - p).collect())
        .collect()
}

/// Difference consecutive stages of one instruction.
fn inner_gaps(timing: &[i64]) -> TimingVector {
    timing
        .iter()
        .tuple_windows()
        .map(|(prev, next)| next - prev)
        .collect()
}

/// Apply the gap mode and realign records with the resulting vectors.
///
/// Inter-instruction differencing yields one vector fewer than there are
/// records; the earliest record is dropped so that vector `i` stays paired
/// with the later of the two instructions it was computed from.
fn apply_gap(
    gap: GapMode,
    mut records: Vec<InstRecord>,
    timings: Vec<TimingVector>,
) -> Result<(Vec<InstRecord>, Vec<TimingVector>)> {
    let timings = match gap {
        GapMode::Raw => timings,
        GapMode::Inter => inter_gaps(&timings),
        GapMode::Inner => timings.iter().map(|t| inner_gaps(t)).collect(),
    };

    let expected_drop = match gap {
        GapMode::Inter => usize::from(!records.is_empty()),
        GapMode::Raw | GapMode::Inner => 0,
    };
    let misaligned = Error::Alignment {
        records: records.len(),
        vectors: timings.len(),
    };
    match records.len().checked_sub(timings.len()) {
        Some(drop) if drop == expected_drop => {
            records.drain(..drop);
            Ok((records, timings))
        }
        _ => Err(misaligned),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disasm::tests::CountingDasm;
    use pipetrace_core::{DecodeMode, Period, TickRange};
    use rusqlite::types::Value;

    const STAGE_COLUMNS: [&str; STAGE_COUNT] = [
        "AtFetch",
        "AtDecode",
        "AtRename",
        "AtDispatch",
        "AtIssue",
        "AtArb",
        "AtRead",
        "AtExecute",
        "AtBypass",
        "AtWriteback",
        "AtCommit",
    ];

    struct TraceRow {
        id: i64,
        fetch: i64,
        step: i64,
        pc: i64,
        inst: Value,
    }

    fn row(id: i64, fetch: i64, step: i64, pc: i64, asm: &str) -> TraceRow {
        TraceRow {
            id,
            fetch,
            step,
            pc,
            inst: Value::Text(asm.to_string()),
        }
    }

    fn create_table(conn: &Connection, inst_type: &str) {
        let columns = STAGE_COLUMNS
            .iter()
            .map(|c| format!("{c} INTEGER NOT NULL"))
            .join(", ");
        conn.execute_batch(&format!(
            "CREATE TABLE {TRACE_TABLE} (ID INTEGER PRIMARY KEY, {columns}, PC INTEGER NOT NULL, DisAsm {inst_type});"
        ))
        .unwrap();
    }

    fn insert(conn: &Connection, rows: &[TraceRow]) {
        let placeholders = std::iter::repeat("?").take(STAGE_COUNT + 3).join(", ");
        let mut stmt = conn
            .prepare(&format!("INSERT INTO {TRACE_TABLE} VALUES ({placeholders})"))
            .unwrap();
        for r in rows {
            let mut values = vec![Value::Integer(r.id)];
            values.extend((0..STAGE_COUNT as i64).map(|k| Value::Integer(r.fetch + k * r.step)));
            values.push(Value::Integer(r.pc));
            values.push(r.inst.clone());
            stmt.execute(params_from_iter(values)).unwrap();
        }
    }

    fn fixture(rows: &[TraceRow]) -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        create_table(&conn, "TEXT");
        insert(&conn, rows);
        conn
    }

    fn config(period: i64, gap: GapMode) -> ReaderConfig {
        ReaderConfig::new(TickRange::default(), Period::new(period).unwrap(), gap)
    }

    fn read(conn: Connection, config: ReaderConfig) -> Result<TraceData> {
        TraceReader::from_connection(conn, config, CountingDasm::default()).read()
    }

    #[test]
    fn test_raw_cycles_in_sequence_order() {
        let conn = fixture(&[
            row(2, 200, 1, 0x8000_0004, "addi a0, a0, 1"),
            row(1, 100, 2, 0x8000_0000, "nop"),
        ]);
        let trace = read(conn, config(1, GapMode::Raw)).unwrap();

        assert_eq!(trace.len(), 2);
        assert_eq!(trace.records[0], InstRecord::new(0x8000_0000, "nop"));
        assert_eq!(trace.records[1], InstRecord::new(0x8000_0004, "addi a0, a0, 1"));
        assert_eq!(trace.timings[0], (0..11i64).map(|k| 100 + 2 * k).collect::<Vec<_>>());
        assert_eq!(trace.timings[1].len(), STAGE_COUNT);
        assert_eq!(trace.gap, GapMode::Raw);
    }

    #[test]
    fn test_ticks_are_floored_to_cycles() {
        let conn = fixture(&[row(1, 1000, 333, 0x0, "nop")]);
        let trace = read(conn, config(333, GapMode::Raw)).unwrap();
        // 1000, 1333, 1666, ... / 333
        assert_eq!(trace.timings[0][0], 3);
        assert_eq!(trace.timings[0][1], 4);
        assert_eq!(trace.timings[0][10], (1000 + 10 * 333) / 333);
    }

    #[test]
    fn test_negative_pc_is_reinterpreted() {
        let conn = fixture(&[row(1, 0, 1, -1, "nop"), row(2, 0, 1, i64::MIN, "nop")]);
        let trace = read(conn, config(1, GapMode::Raw)).unwrap();
        assert_eq!(trace.records[0].pc, u64::MAX);
        assert_eq!(trace.records[1].pc, 1u64 << 63);
    }

    #[test]
    fn test_tick_range_filters_on_commit() {
        // Commit tick = fetch + 10.
        let rows = [
            row(1, 0, 1, 0x0, "nop"),
            row(2, 100, 1, 0x4, "nop"),
            row(3, 200, 1, 0x8, "nop"),
        ];

        let mut cfg = config(1, GapMode::Raw);
        cfg.ticks = TickRange::from_bounds(110, 110);
        let trace = read(fixture(&rows), cfg.clone()).unwrap();
        assert_eq!(trace.records.iter().map(|r| r.pc).collect::<Vec<_>>(), vec![0x4]);

        cfg.ticks = TickRange::from_bounds(110, -1);
        let trace = read(fixture(&rows), cfg).unwrap();
        assert_eq!(trace.records.iter().map(|r| r.pc).collect::<Vec<_>>(), vec![0x4, 0x8]);
    }

    #[test]
    fn test_limit_caps_rows() {
        let rows = [
            row(1, 0, 1, 0x0, "nop"),
            row(2, 10, 1, 0x4, "nop"),
            row(3, 20, 1, 0x8, "nop"),
        ];
        let cfg = config(1, GapMode::Raw).with_limit(Some(2));
        let trace = read(fixture(&rows), cfg).unwrap();
        assert_eq!(trace.len(), 2);
        assert_eq!(trace.records[1].pc, 0x4);
    }

    #[test]
    fn test_inter_gap_drops_first_record() {
        let rows = [
            row(1, 0, 1, 0x0, "a"),
            row(2, 5, 2, 0x4, "b"),
            row(3, 12, 1, 0x8, "c"),
        ];
        let trace = read(fixture(&rows), config(1, GapMode::Inter)).unwrap();

        assert_eq!(trace.timings.len(), 2);
        assert_eq!(trace.records.len(), 2);
        assert_eq!(trace.records[0].asm, "b");
        assert_eq!(trace.records[1].asm, "c");
        // Stage k of row 2 minus row 1: (5 + 2k) - k.
        assert_eq!(trace.timings[0], (0..11i64).map(|k| 5 + k).collect::<Vec<_>>());
        assert_eq!(trace.timings[1], (0..11i64).map(|k| 7 - k).collect::<Vec<_>>());
    }

    #[test]
    fn test_inter_gap_single_row_is_empty() {
        let trace = read(fixture(&[row(1, 0, 1, 0x0, "nop")]), config(1, GapMode::Inter)).unwrap();
        assert!(trace.is_empty());
        assert!(trace.profile.is_empty());
    }

    #[test]
    fn test_inner_gap_keeps_every_record() {
        let rows = [row(1, 0, 3, 0x0, "a"), row(2, 50, 4, 0x4, "b")];
        let trace = read(fixture(&rows), config(1, GapMode::Inner)).unwrap();

        assert_eq!(trace.records.len(), 2);
        assert_eq!(trace.timings[0], vec![3; STAGE_COUNT - 1]);
        assert_eq!(trace.timings[1], vec![4; STAGE_COUNT - 1]);
    }

    #[test]
    fn test_profile_averages_repeated_instruction() {
        let rows = [
            row(1, 10, 1, 0x8000_0000, "nop"),
            row(2, 20, 1, 0x8000_0000, "nop"),
        ];
        let trace = read(fixture(&rows), config(1, GapMode::Raw)).unwrap();
        let mean = trace
            .profile
            .mean(&InstRecord::new(0x8000_0000, "nop"))
            .unwrap();
        assert_eq!(mean[0], 15.0);
        assert_eq!(mean.len(), STAGE_COUNT);
    }

    #[test]
    fn test_raw_words_are_decoded_once() {
        let conn = Connection::open_in_memory().unwrap();
        create_table(&conn, "INTEGER");
        let word = |id, pc, w| TraceRow {
            id,
            fetch: id * 10,
            step: 1,
            pc,
            inst: Value::Integer(w),
        };
        insert(
            &conn,
            &[word(1, 0x0, 0x13), word(2, 0x4, 0x6f), word(3, 0x0, 0x13)],
        );

        let cfg = config(1, GapMode::Raw).with_decode(DecodeMode::RawOpcode);
        let mut reader = TraceReader::from_connection(conn, cfg, CountingDasm::default());
        let trace = reader.read().unwrap();

        assert_eq!(trace.records[0].asm, "op_13 x0, x0");
        assert_eq!(trace.records[1].asm, "op_6f x0, x0");
        assert_eq!(reader.disasm_cache().inner().calls.get(), 2);
    }

    #[test]
    fn test_raw_word_without_decoding_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        create_table(&conn, "INTEGER");
        insert(
            &conn,
            &[TraceRow {
                id: 1,
                fetch: 0,
                step: 1,
                pc: 0,
                inst: Value::Integer(0x13),
            }],
        );
        let err = read(conn, config(1, GapMode::Raw)).unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn test_missing_pc_column_is_schema_error() {
        let conn = Connection::open_in_memory().unwrap();
        let columns = STAGE_COLUMNS.iter().map(|c| format!("{c} INTEGER")).join(", ");
        conn.execute_batch(&format!(
            "CREATE TABLE {TRACE_TABLE} (ID INTEGER PRIMARY KEY, {columns}, DisAsm TEXT);"
        ))
        .unwrap();
        let err = read(conn, config(1, GapMode::Raw)).unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn test_missing_table_is_database_error() {
        let conn = Connection::open_in_memory().unwrap();
        let err = read(conn, config(1, GapMode::Raw)).unwrap_err();
        assert!(matches!(err, Error::Database(_)));
    }

    #[test]
    fn test_open_file_backed_trace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.db");
        {
            let conn = Connection::open(&path).unwrap();
            create_table(&conn, "TEXT");
            insert(&conn, &[row(1, 0, 1, 0x1000, "ret")]);
        }

        let mut reader =
            TraceReader::open(&path, config(1, GapMode::Raw), CountingDasm::default()).unwrap();
        let trace = reader.read().unwrap();
        assert_eq!(trace.records, vec![InstRecord::new(0x1000, "ret")]);
    }

    #[test]
    fn test_open_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = TraceReader::open(
            dir.path().join("absent.db"),
            config(1, GapMode::Raw),
            CountingDasm::default(),
        );
        assert!(matches!(result, Err(Error::Database(_))));
    }

    #[test]
    fn test_apply_gap_rejects_misaligned_input() {
        let records = vec![InstRecord::new(0, "a"), InstRecord::new(4, "b")];
        let err = apply_gap(GapMode::Raw, records, vec![vec![0; STAGE_COUNT]]).unwrap_err();
        assert!(matches!(
            err,
            Error::Alignment {
                records: 2,
                vectors: 1
            }
        ));
    }
}
