//! SQLite analysis store
//!
//! Single connection behind a mutex: the scheduler is the only writer and
//! read-model queries share the same handle. Every derived table is keyed by
//! token (and timeframe where relevant) and written with
//! `INSERT .. ON CONFLICT DO UPDATE`. Market caps on signals are stored as
//! decimal TEXT.

use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use tracing::info;

use crate::domain::ai::{AiDecision, Decision};
use crate::domain::candle::{Candle, Timeframe};
use crate::domain::indicators::{
    BreakoutLevel, BreakoutState, BuySellScore, ExpectedMove, PricePosition, PumpLabel, PumpScore, RiskLevel,
    RiskProfile, SupportResistance, Timing15m, TimingSignal, TradeDecision, TransitionConditions, TransitionPhase,
    TransitionState, Trend, TrendBias, VolumeAnomaly,
};
use crate::domain::market::MarketSnapshot;
use crate::domain::signal::{NewSignal, Signal, SignalStatus};
use crate::domain::token::{ClassifiedToken, Token, TokenStatus};
use crate::ports::store::{
    AnalysisStore, DiscoveryUpsert, IndicatorRow, PruneReport, RetentionPolicy, StoreError, TokenIndicators,
    TokenMarketUpdate,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS tokens (
    address TEXT PRIMARY KEY,
    name TEXT,
    symbol TEXT,
    source TEXT,
    tier INTEGER NOT NULL DEFAULT 1,
    status TEXT NOT NULL DEFAULT 'active',
    price REAL,
    market_cap REAL,
    volume_24h REAL,
    liquidity REAL,
    holders INTEGER,
    dex_id TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER,
    last_ai_check_at INTEGER
);

CREATE TABLE IF NOT EXISTS snapshots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    token_address TEXT NOT NULL,
    price REAL,
    market_cap REAL,
    volume_24h REAL,
    liquidity REAL,
    holders INTEGER,
    dex_id TEXT,
    timestamp INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_snapshots_token_ts ON snapshots(token_address, timestamp);

CREATE TABLE IF NOT EXISTS candles (
    token_address TEXT NOT NULL,
    timeframe TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    open REAL NOT NULL,
    high REAL NOT NULL,
    low REAL NOT NULL,
    close REAL NOT NULL,
    volume REAL NOT NULL,
    PRIMARY KEY (token_address, timeframe, timestamp)
);

CREATE TABLE IF NOT EXISTS support_resistance (
    token_address TEXT NOT NULL,
    timeframe TEXT NOT NULL,
    supports_json TEXT NOT NULL,
    resistances_json TEXT NOT NULL,
    last_calculated_at INTEGER NOT NULL,
    calculated_at INTEGER NOT NULL,
    PRIMARY KEY (token_address, timeframe)
);

CREATE TABLE IF NOT EXISTS trend_bias (
    token_address TEXT NOT NULL,
    timeframe TEXT NOT NULL,
    trend TEXT NOT NULL,
    strength REAL NOT NULL,
    price_position TEXT NOT NULL,
    calculated_at INTEGER NOT NULL,
    PRIMARY KEY (token_address, timeframe)
);

CREATE TABLE IF NOT EXISTS timing_15m (
    token_address TEXT PRIMARY KEY,
    momentum REAL NOT NULL,
    volatility REAL NOT NULL,
    entry_quality REAL NOT NULL,
    signal TEXT NOT NULL,
    calculated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS volume_anomaly (
    token_address TEXT PRIMARY KEY,
    volume_ratio REAL NOT NULL,
    anomaly INTEGER NOT NULL,
    calculated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS pump_score (
    token_address TEXT PRIMARY KEY,
    score REAL NOT NULL,
    label TEXT NOT NULL,
    previous_score REAL,
    calculated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS risk_profile (
    token_address TEXT PRIMARY KEY,
    risk_level TEXT NOT NULL,
    expected_move TEXT NOT NULL,
    failure_risk REAL NOT NULL,
    setup_quality REAL NOT NULL,
    calculated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS breakout_state (
    token_address TEXT PRIMARY KEY,
    state TEXT NOT NULL,
    score INTEGER NOT NULL,
    resistance REAL,
    calculated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS transition_state (
    token_address TEXT PRIMARY KEY,
    state TEXT NOT NULL,
    satisfied INTEGER NOT NULL,
    conditions_json TEXT NOT NULL,
    calculated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS buy_sell_score (
    token_address TEXT PRIMARY KEY,
    buy_score REAL NOT NULL,
    sell_score REAL NOT NULL,
    decision TEXT NOT NULL,
    confidence REAL NOT NULL,
    calculated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS signals (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    token_address TEXT NOT NULL,
    name TEXT,
    symbol TEXT,
    start_market_cap TEXT NOT NULL,
    last_market_cap TEXT NOT NULL,
    peak_market_cap TEXT NOT NULL,
    status INTEGER NOT NULL,
    tp_stage INTEGER NOT NULL DEFAULT 0,
    opened_at INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    decision_raw TEXT
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_signals_one_open ON signals(token_address) WHERE status = 1;

CREATE TABLE IF NOT EXISTS ai_decisions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    token_address TEXT NOT NULL,
    token_name TEXT,
    model TEXT NOT NULL,
    decision TEXT NOT NULL,
    snapshot_hash TEXT NOT NULL,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_ai_decisions_token ON ai_decisions(token_address, created_at);
"#;

/// Tables cleared when a token dies
const HISTORY_TABLES: [&str; 11] = [
    "snapshots",
    "candles",
    "support_resistance",
    "trend_bias",
    "timing_15m",
    "volume_anomaly",
    "pump_score",
    "risk_profile",
    "breakout_state",
    "transition_state",
    "buy_sell_score",
];

const TOKEN_COLUMNS: &str = "address, name, symbol, source, tier, status, price, market_cap, volume_24h, \
    liquidity, holders, dex_id, created_at, updated_at, last_ai_check_at";

const SIGNAL_COLUMNS: &str = "id, token_address, name, symbol, start_market_cap, last_market_cap, \
    peak_market_cap, status, tp_stage, opened_at, created_at, updated_at, decision_raw";

const SNAPSHOT_COLUMNS: &str = "token_address, price, market_cap, volume_24h, liquidity, holders, dex_id, timestamp";

const DECISION_COLUMNS: &str = "token_address, token_name, model, decision, snapshot_hash, created_at";

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

fn conversion_error(idx: usize, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, format!("unexpected value '{}'", value).into())
}

fn parse_col<T>(row: &Row<'_>, idx: usize, parse: impl Fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(&raw).ok_or_else(|| conversion_error(idx, &raw))
}

fn decimal_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    parse_col(row, idx, |s| Decimal::from_str(s).ok())
}

fn holders_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<u64>> {
    Ok(row.get::<_, Option<i64>>(idx)?.map(|h| h.max(0) as u64))
}

fn token_from_row(row: &Row<'_>) -> rusqlite::Result<Token> {
    Ok(Token {
        address: row.get(0)?,
        name: row.get(1)?,
        symbol: row.get(2)?,
        source: row.get(3)?,
        tier: row.get::<_, i64>(4)?.clamp(0, u8::MAX as i64) as u8,
        status: parse_col(row, 5, TokenStatus::parse)?,
        price: row.get(6)?,
        market_cap: row.get(7)?,
        volume_24h: row.get(8)?,
        liquidity: row.get(9)?,
        holders: holders_col(row, 10)?,
        dex_id: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
        last_ai_check_at: row.get(14)?,
    })
}

fn snapshot_from_row(row: &Row<'_>) -> rusqlite::Result<MarketSnapshot> {
    Ok(MarketSnapshot {
        token_address: row.get(0)?,
        price: row.get(1)?,
        market_cap: row.get(2)?,
        volume_24h: row.get(3)?,
        liquidity: row.get(4)?,
        holders: holders_col(row, 5)?,
        dex_id: row.get(6)?,
        timestamp: row.get(7)?,
    })
}

fn candle_from_row(row: &Row<'_>) -> rusqlite::Result<Candle> {
    Ok(Candle::new(row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?))
}

fn signal_from_row(row: &Row<'_>) -> rusqlite::Result<Signal> {
    let status_code: i64 = row.get(7)?;
    Ok(Signal {
        id: row.get(0)?,
        token_address: row.get(1)?,
        name: row.get(2)?,
        symbol: row.get(3)?,
        start_market_cap: decimal_col(row, 4)?,
        last_market_cap: decimal_col(row, 5)?,
        peak_market_cap: decimal_col(row, 6)?,
        status: SignalStatus::from_code(status_code).ok_or_else(|| conversion_error(7, &status_code.to_string()))?,
        tp_stage: row.get::<_, i64>(8)?.clamp(0, 3) as u8,
        opened_at: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
        decision_raw: row.get(12)?,
    })
}

fn decision_from_row(row: &Row<'_>) -> rusqlite::Result<AiDecision> {
    Ok(AiDecision {
        token_address: row.get(0)?,
        token_name: row.get(1)?,
        model: row.get(2)?,
        decision: parse_col(row, 3, |s| s.parse::<Decision>().ok())?,
        snapshot_hash: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database file and apply the schema
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Database(e.to_string()))?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        info!("[STORE] Opened SQLite database at {}", path.display());
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection lock poisoned".to_string()))
    }

    fn query_tokens(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Token>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, token_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn query_decisions(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<AiDecision>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, decision_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn write_snapshot(conn: &Connection, snapshot: &MarketSnapshot) -> Result<(), StoreError> {
    conn.execute(
        &format!("INSERT INTO snapshots ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)", SNAPSHOT_COLUMNS),
        params![
            snapshot.token_address,
            snapshot.price,
            snapshot.market_cap,
            snapshot.volume_24h,
            snapshot.liquidity,
            snapshot.holders.map(|h| h as i64),
            snapshot.dex_id,
            snapshot.timestamp,
        ],
    )?;
    Ok(())
}

fn read_indicators(conn: &Connection, address: &str) -> Result<TokenIndicators, StoreError> {
    let trend_4h = conn
        .query_row(
            "SELECT trend, strength, price_position FROM trend_bias WHERE token_address = ?1 AND timeframe = '4h'",
            params![address],
            |row| {
                Ok(TrendBias {
                    trend: parse_col(row, 0, Trend::parse)?,
                    strength: row.get(1)?,
                    price_position: parse_col(row, 2, PricePosition::parse)?,
                })
            },
        )
        .optional()?;

    let timing_15m = conn
        .query_row(
            "SELECT momentum, volatility, entry_quality, signal FROM timing_15m WHERE token_address = ?1",
            params![address],
            |row| {
                Ok(Timing15m {
                    momentum: row.get(0)?,
                    volatility: row.get(1)?,
                    entry_quality: row.get(2)?,
                    signal: parse_col(row, 3, TimingSignal::parse)?,
                })
            },
        )
        .optional()?;

    let volume = conn
        .query_row(
            "SELECT volume_ratio, anomaly FROM volume_anomaly WHERE token_address = ?1",
            params![address],
            |row| Ok(VolumeAnomaly { volume_ratio: row.get(0)?, anomaly: row.get::<_, i64>(1)? != 0 }),
        )
        .optional()?;

    let pump = conn
        .query_row(
            "SELECT score, label, previous_score FROM pump_score WHERE token_address = ?1",
            params![address],
            |row| {
                Ok(PumpScore {
                    score: row.get(0)?,
                    label: parse_col(row, 1, PumpLabel::parse)?,
                    previous_score: row.get(2)?,
                })
            },
        )
        .optional()?;

    let risk = conn
        .query_row(
            "SELECT risk_level, expected_move, failure_risk, setup_quality FROM risk_profile WHERE token_address = ?1",
            params![address],
            |row| {
                Ok(RiskProfile {
                    risk_level: parse_col(row, 0, RiskLevel::parse)?,
                    expected_move: parse_col(row, 1, ExpectedMove::parse)?,
                    failure_risk: row.get(2)?,
                    setup_quality: row.get(3)?,
                })
            },
        )
        .optional()?;

    let breakout = conn
        .query_row(
            "SELECT state, score, resistance FROM breakout_state WHERE token_address = ?1",
            params![address],
            |row| {
                Ok(BreakoutState {
                    state: parse_col(row, 0, BreakoutLevel::parse)?,
                    score: row.get::<_, i64>(1)?.clamp(0, 4) as u8,
                    resistance: row.get(2)?,
                })
            },
        )
        .optional()?;

    let transition = conn
        .query_row(
            "SELECT state, satisfied, conditions_json FROM transition_state WHERE token_address = ?1",
            params![address],
            |row| Ok((parse_col(row, 0, TransitionPhase::parse)?, row.get::<_, i64>(1)?, row.get::<_, String>(2)?)),
        )
        .optional()?
        .map(|(state, satisfied, json)| -> Result<TransitionState, StoreError> {
            let conditions: TransitionConditions = serde_json::from_str(&json)?;
            Ok(TransitionState { state, satisfied: satisfied.clamp(0, 5) as u8, conditions })
        })
        .transpose()?;

    let score = conn
        .query_row(
            "SELECT buy_score, sell_score, decision, confidence FROM buy_sell_score WHERE token_address = ?1",
            params![address],
            |row| {
                Ok(BuySellScore {
                    buy_score: row.get(0)?,
                    sell_score: row.get(1)?,
                    decision: parse_col(row, 2, TradeDecision::parse)?,
                    confidence: row.get(3)?,
                })
            },
        )
        .optional()?;

    Ok(TokenIndicators { trend_4h, timing_15m, volume, pump, risk, breakout, transition, score })
}

impl AnalysisStore for SqliteStore {
    fn upsert_discovered(&self, token: &ClassifiedToken, now: i64) -> Result<DiscoveryUpsert, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let existing: Option<String> = tx
            .query_row("SELECT status FROM tokens WHERE address = ?1", params![token.address], |row| row.get(0))
            .optional()?;

        let outcome = match existing.as_deref().and_then(TokenStatus::parse) {
            Some(TokenStatus::Dead) => return Ok(DiscoveryUpsert::SkippedDead),
            Some(TokenStatus::Active) => DiscoveryUpsert::Merged,
            None => DiscoveryUpsert::Inserted,
        };

        tx.execute(
            "INSERT INTO tokens (address, name, symbol, source, tier, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(address) DO UPDATE SET
                name = COALESCE(tokens.name, excluded.name),
                symbol = COALESCE(tokens.symbol, excluded.symbol),
                source = COALESCE(tokens.source, excluded.source)",
            params![
                token.address,
                token.name,
                token.symbol,
                token.source,
                token.tier as i64,
                token.status.as_str(),
                now
            ],
        )?;
        tx.commit()?;
        Ok(outcome)
    }

    fn token(&self, address: &str) -> Result<Option<Token>, StoreError> {
        let conn = self.conn()?;
        Ok(conn
            .query_row(
                &format!("SELECT {} FROM tokens WHERE address = ?1", TOKEN_COLUMNS),
                params![address],
                token_from_row,
            )
            .optional()?)
    }

    fn active_tokens(&self) -> Result<Vec<Token>, StoreError> {
        self.query_tokens(
            &format!("SELECT {} FROM tokens WHERE status = 'active' ORDER BY address", TOKEN_COLUMNS),
            [],
        )
    }

    fn tokens_due_for_update(&self, stale_before: i64) -> Result<Vec<Token>, StoreError> {
        self.query_tokens(
            &format!(
                "SELECT {} FROM tokens
                 WHERE status = 'active' AND (updated_at IS NULL OR updated_at < ?1)
                 ORDER BY updated_at ASC, address ASC",
                TOKEN_COLUMNS
            ),
            params![stale_before],
        )
    }

    fn mark_dead(&self, address: &str, now: i64) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let updated = tx.execute(
            "UPDATE tokens SET status = 'dead', updated_at = ?2 WHERE address = ?1",
            params![address, now],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound(address.to_string()));
        }
        for table in HISTORY_TABLES {
            tx.execute(&format!("DELETE FROM {} WHERE token_address = ?1", table), params![address])?;
        }

        tx.commit()?;
        Ok(())
    }

    fn record_market_update(&self, update: &TokenMarketUpdate<'_>) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let token = update.token;

        let updated = tx.execute(
            "UPDATE tokens SET
                name = ?2, symbol = ?3, price = ?4, market_cap = ?5, volume_24h = ?6,
                liquidity = ?7, holders = ?8, dex_id = ?9, updated_at = ?10
             WHERE address = ?1",
            params![
                token.address,
                token.name,
                token.symbol,
                token.price,
                token.market_cap,
                token.volume_24h,
                token.liquidity,
                token.holders.map(|h| h as i64),
                token.dex_id,
                token.updated_at,
            ],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound(token.address.clone()));
        }

        write_snapshot(&tx, update.snapshot)?;

        if let Some(signal) = update.signal {
            let updated = tx.execute(
                "UPDATE signals SET
                    last_market_cap = ?2, peak_market_cap = ?3, status = ?4, tp_stage = ?5, updated_at = ?6
                 WHERE id = ?1",
                params![
                    signal.id,
                    signal.last_market_cap.to_string(),
                    signal.peak_market_cap.to_string(),
                    signal.status.code(),
                    signal.tp_stage as i64,
                    signal.updated_at,
                ],
            )?;
            if updated == 0 {
                return Err(StoreError::NotFound(format!("signal {}", signal.id)));
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn insert_snapshot(&self, snapshot: &MarketSnapshot) -> Result<(), StoreError> {
        write_snapshot(&*self.conn()?, snapshot)
    }

    fn snapshots_since(&self, address: &str, since: i64) -> Result<Vec<MarketSnapshot>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM snapshots WHERE token_address = ?1 AND timestamp >= ?2 ORDER BY timestamp ASC, id ASC",
            SNAPSHOT_COLUMNS
        ))?;
        let rows = stmt.query_map(params![address, since], snapshot_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn latest_snapshots(&self, address: &str, limit: usize) -> Result<Vec<MarketSnapshot>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM snapshots WHERE token_address = ?1 ORDER BY timestamp DESC, id DESC LIMIT ?2",
            SNAPSHOT_COLUMNS
        ))?;
        let rows = stmt.query_map(params![address, limit as i64], snapshot_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn snapshot_count(&self, address: &str) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM snapshots WHERE token_address = ?1", params![address], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn latest_candle(&self, address: &str, timeframe: Timeframe) -> Result<Option<Candle>, StoreError> {
        Ok(self
            .conn()?
            .query_row(
                "SELECT timestamp, open, high, low, close, volume FROM candles
                 WHERE token_address = ?1 AND timeframe = ?2 ORDER BY timestamp DESC LIMIT 1",
                params![address, timeframe.as_str()],
                candle_from_row,
            )
            .optional()?)
    }

    fn upsert_candles(&self, address: &str, timeframe: Timeframe, candles: &[Candle]) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO candles (token_address, timeframe, timestamp, open, high, low, close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(token_address, timeframe, timestamp) DO UPDATE SET
                    open = excluded.open, high = excluded.high, low = excluded.low,
                    close = excluded.close, volume = excluded.volume",
            )?;
            for c in candles {
                stmt.execute(params![
                    address,
                    timeframe.as_str(),
                    c.timestamp,
                    c.open,
                    c.high,
                    c.low,
                    c.close,
                    c.volume
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn recent_candles(&self, address: &str, timeframe: Timeframe, limit: Option<usize>) -> Result<Vec<Candle>, StoreError> {
        let conn = self.conn()?;
        let limit = limit.map_or(-1, |n| n as i64);
        let mut stmt = conn.prepare(
            "SELECT timestamp, open, high, low, close, volume FROM (
                SELECT * FROM candles WHERE token_address = ?1 AND timeframe = ?2
                ORDER BY timestamp DESC LIMIT ?3
             ) ORDER BY timestamp ASC",
        )?;
        let rows = stmt.query_map(params![address, timeframe.as_str(), limit], candle_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn candle_count(&self, address: &str) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM candles WHERE token_address = ?1", params![address], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn support_resistance(&self, address: &str, timeframe: Timeframe) -> Result<Option<SupportResistance>, StoreError> {
        let row: Option<(String, String, i64)> = self
            .conn()?
            .query_row(
                "SELECT supports_json, resistances_json, last_calculated_at FROM support_resistance
                 WHERE token_address = ?1 AND timeframe = ?2",
                params![address, timeframe.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        row.map(|(supports, resistances, last_calculated_at)| -> Result<SupportResistance, StoreError> {
            Ok(SupportResistance {
                supports: serde_json::from_str(&supports)?,
                resistances: serde_json::from_str(&resistances)?,
                last_calculated_at,
            })
        })
        .transpose()
    }

    fn upsert_support_resistance(
        &self,
        address: &str,
        timeframe: Timeframe,
        levels: &SupportResistance,
        now: i64,
    ) -> Result<(), StoreError> {
        let supports = serde_json::to_string(&levels.supports)?;
        let resistances = serde_json::to_string(&levels.resistances)?;
        self.conn()?.execute(
            "INSERT INTO support_resistance
                (token_address, timeframe, supports_json, resistances_json, last_calculated_at, calculated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(token_address, timeframe) DO UPDATE SET
                supports_json = excluded.supports_json,
                resistances_json = excluded.resistances_json,
                last_calculated_at = excluded.last_calculated_at,
                calculated_at = excluded.calculated_at",
            params![address, timeframe.as_str(), supports, resistances, levels.last_calculated_at, now],
        )?;
        Ok(())
    }

    fn indicators(&self, address: &str) -> Result<TokenIndicators, StoreError> {
        read_indicators(&*self.conn()?, address)
    }

    fn upsert_indicator(&self, address: &str, row: &IndicatorRow, now: i64) -> Result<(), StoreError> {
        let conn = self.conn()?;
        match row {
            IndicatorRow::Trend(t) => conn.execute(
                "INSERT INTO trend_bias (token_address, timeframe, trend, strength, price_position, calculated_at)
                 VALUES (?1, '4h', ?2, ?3, ?4, ?5)
                 ON CONFLICT(token_address, timeframe) DO UPDATE SET
                    trend = excluded.trend, strength = excluded.strength,
                    price_position = excluded.price_position, calculated_at = excluded.calculated_at",
                params![address, t.trend.as_str(), t.strength, t.price_position.as_str(), now],
            )?,
            IndicatorRow::Timing(t) => conn.execute(
                "INSERT INTO timing_15m (token_address, momentum, volatility, entry_quality, signal, calculated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(token_address) DO UPDATE SET
                    momentum = excluded.momentum, volatility = excluded.volatility,
                    entry_quality = excluded.entry_quality, signal = excluded.signal,
                    calculated_at = excluded.calculated_at",
                params![address, t.momentum, t.volatility, t.entry_quality, t.signal.as_str(), now],
            )?,
            IndicatorRow::Volume(v) => conn.execute(
                "INSERT INTO volume_anomaly (token_address, volume_ratio, anomaly, calculated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(token_address) DO UPDATE SET
                    volume_ratio = excluded.volume_ratio, anomaly = excluded.anomaly,
                    calculated_at = excluded.calculated_at",
                params![address, v.volume_ratio, v.anomaly as i64, now],
            )?,
            IndicatorRow::Pump(p) => conn.execute(
                "INSERT INTO pump_score (token_address, score, label, previous_score, calculated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(token_address) DO UPDATE SET
                    score = excluded.score, label = excluded.label,
                    previous_score = excluded.previous_score, calculated_at = excluded.calculated_at",
                params![address, p.score, p.label.as_str(), p.previous_score, now],
            )?,
            IndicatorRow::Risk(r) => conn.execute(
                "INSERT INTO risk_profile (token_address, risk_level, expected_move, failure_risk, setup_quality, calculated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(token_address) DO UPDATE SET
                    risk_level = excluded.risk_level, expected_move = excluded.expected_move,
                    failure_risk = excluded.failure_risk, setup_quality = excluded.setup_quality,
                    calculated_at = excluded.calculated_at",
                params![address, r.risk_level.as_str(), r.expected_move.as_str(), r.failure_risk, r.setup_quality, now],
            )?,
            IndicatorRow::Breakout(b) => conn.execute(
                "INSERT INTO breakout_state (token_address, state, score, resistance, calculated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(token_address) DO UPDATE SET
                    state = excluded.state, score = excluded.score,
                    resistance = excluded.resistance, calculated_at = excluded.calculated_at",
                params![address, b.state.as_str(), b.score as i64, b.resistance, now],
            )?,
            IndicatorRow::Transition(t) => {
                let conditions = serde_json::to_string(&t.conditions)?;
                conn.execute(
                    "INSERT INTO transition_state (token_address, state, satisfied, conditions_json, calculated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(token_address) DO UPDATE SET
                        state = excluded.state, satisfied = excluded.satisfied,
                        conditions_json = excluded.conditions_json, calculated_at = excluded.calculated_at",
                    params![address, t.state.as_str(), t.satisfied as i64, conditions, now],
                )?
            }
            IndicatorRow::Score(s) => conn.execute(
                "INSERT INTO buy_sell_score (token_address, buy_score, sell_score, decision, confidence, calculated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(token_address) DO UPDATE SET
                    buy_score = excluded.buy_score, sell_score = excluded.sell_score,
                    decision = excluded.decision, confidence = excluded.confidence,
                    calculated_at = excluded.calculated_at",
                params![address, s.buy_score, s.sell_score, s.decision.as_str(), s.confidence, now],
            )?,
        };
        Ok(())
    }

    fn open_signal(&self, address: &str) -> Result<Option<Signal>, StoreError> {
        Ok(self
            .conn()?
            .query_row(
                &format!("SELECT {} FROM signals WHERE token_address = ?1 AND status = 1", SIGNAL_COLUMNS),
                params![address],
                signal_from_row,
            )
            .optional()?)
    }

    fn insert_signal(&self, signal: &NewSignal) -> Result<Signal, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let open: i64 = tx.query_row(
            "SELECT COUNT(*) FROM signals WHERE token_address = ?1 AND status = 1",
            params![signal.token_address],
            |row| row.get(0),
        )?;
        if open > 0 {
            return Err(StoreError::Conflict(format!("open signal exists for {}", signal.token_address)));
        }

        let entry = signal.entry_market_cap.to_string();
        tx.execute(
            "INSERT INTO signals
                (token_address, name, symbol, start_market_cap, last_market_cap, peak_market_cap,
                 status, tp_stage, opened_at, created_at, updated_at, decision_raw)
             VALUES (?1, ?2, ?3, ?4, ?4, ?4, ?5, 0, ?6, ?6, ?6, ?7)",
            params![
                signal.token_address,
                signal.name,
                signal.symbol,
                entry,
                SignalStatus::Open.code(),
                signal.opened_at,
                signal.decision_raw,
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(signal.clone().into_signal(id))
    }

    fn signals(&self) -> Result<Vec<Signal>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {} FROM signals ORDER BY created_at DESC, id DESC", SIGNAL_COLUMNS))?;
        let rows = stmt.query_map([], signal_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn latest_ai_decision(&self, address: &str) -> Result<Option<AiDecision>, StoreError> {
        Ok(self.recent_ai_decisions(address, 1)?.into_iter().next())
    }

    fn latest_ai_decision_for_model(&self, address: &str, model: &str) -> Result<Option<AiDecision>, StoreError> {
        Ok(self
            .query_decisions(
                &format!(
                    "SELECT {} FROM ai_decisions WHERE token_address = ?1 AND model = ?2
                     ORDER BY created_at DESC, id DESC LIMIT 1",
                    DECISION_COLUMNS
                ),
                params![address, model],
            )?
            .into_iter()
            .next())
    }

    fn recent_ai_decisions(&self, address: &str, limit: usize) -> Result<Vec<AiDecision>, StoreError> {
        self.query_decisions(
            &format!(
                "SELECT {} FROM ai_decisions WHERE token_address = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2",
                DECISION_COLUMNS
            ),
            params![address, limit as i64],
        )
    }

    fn insert_ai_decisions(&self, decisions: &[AiDecision]) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for d in decisions {
            tx.execute(
                &format!("INSERT INTO ai_decisions ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)", DECISION_COLUMNS),
                params![d.token_address, d.token_name, d.model, d.decision.as_str(), d.snapshot_hash, d.created_at],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn touch_ai_check(&self, address: &str, now: i64) -> Result<(), StoreError> {
        let updated = self
            .conn()?
            .execute("UPDATE tokens SET last_ai_check_at = ?2 WHERE address = ?1", params![address, now])?;
        if updated == 0 {
            return Err(StoreError::NotFound(address.to_string()));
        }
        Ok(())
    }

    fn purge_dead_tokens(&self) -> Result<usize, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let dead_filter = "token_address IN (SELECT address FROM tokens WHERE status = 'dead')";
        for table in HISTORY_TABLES.iter().chain(["ai_decisions", "signals"].iter()) {
            tx.execute(&format!("DELETE FROM {} WHERE {}", table, dead_filter), [])?;
        }
        let purged = tx.execute("DELETE FROM tokens WHERE status = 'dead'", [])?;

        tx.commit()?;
        Ok(purged)
    }

    fn prune_history(&self, policy: &RetentionPolicy) -> Result<PruneReport, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let snapshots_pruned = tx.execute(
            "DELETE FROM snapshots WHERE id IN (
                SELECT id FROM (
                    SELECT id, ROW_NUMBER() OVER (
                        PARTITION BY token_address ORDER BY timestamp DESC, id DESC
                    ) AS rn FROM snapshots
                ) WHERE rn > ?1
             )",
            params![policy.snapshots_per_token as i64],
        )?;

        let candles_pruned = tx.execute(
            "DELETE FROM candles WHERE rowid IN (
                SELECT rowid FROM (
                    SELECT rowid, ROW_NUMBER() OVER (
                        PARTITION BY token_address, timeframe ORDER BY timestamp DESC
                    ) AS rn FROM candles
                ) WHERE rn > ?1
             )",
            params![policy.candles_per_timeframe as i64],
        )?;

        let ai_decisions_pruned = tx.execute(
            "DELETE FROM ai_decisions WHERE id IN (
                SELECT id FROM (
                    SELECT id, ROW_NUMBER() OVER (
                        PARTITION BY token_address ORDER BY created_at DESC, id DESC
                    ) AS rn FROM ai_decisions
                ) WHERE rn > ?1
             )",
            params![policy.ai_decisions_per_token as i64],
        )?;

        tx.commit()?;
        Ok(PruneReport { dead_tokens_purged: 0, snapshots_pruned, candles_pruned, ai_decisions_pruned })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicators::Level;
    use crate::domain::token::{classify, DiscoveredToken};
    use rust_decimal_macros::dec;

    fn store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    fn discovered(address: &str, name: Option<&str>) -> ClassifiedToken {
        classify(DiscoveredToken {
            address: address.to_string(),
            chain: "solana".to_string(),
            name: name.map(str::to_string),
            symbol: None,
            source: Some("pumpswap".to_string()),
        })
    }

    fn snapshot(address: &str, ts: i64) -> MarketSnapshot {
        MarketSnapshot {
            token_address: address.to_string(),
            price: Some(0.001),
            market_cap: Some(1_000_000.0),
            volume_24h: Some(300_000.0),
            liquidity: Some(40_000.0),
            holders: Some(250),
            dex_id: Some("raydium".to_string()),
            timestamp: ts,
        }
    }

    #[test]
    fn test_discovery_merge_keeps_known_name() {
        let store = store();
        assert_eq!(store.upsert_discovered(&discovered("A", Some("Alpha")), 1).unwrap(), DiscoveryUpsert::Inserted);
        assert_eq!(store.upsert_discovered(&discovered("A", Some("Other")), 2).unwrap(), DiscoveryUpsert::Merged);

        let token = store.token("A").unwrap().unwrap();
        assert_eq!(token.name.as_deref(), Some("Alpha"));
        assert_eq!(token.created_at, 1);
        assert_eq!(token.status, TokenStatus::Active);
    }

    #[test]
    fn test_market_update_is_applied_with_signal() {
        let store = store();
        store.upsert_discovered(&discovered("A", None), 0).unwrap();
        let mut signal = store
            .insert_signal(&NewSignal::new("A".to_string(), dec!(1000000), 0).unwrap())
            .unwrap();

        let mut token = store.token("A").unwrap().unwrap();
        token.market_cap = Some(1_350_000.0);
        token.updated_at = Some(60_000);
        signal.last_market_cap = dec!(1350000);
        signal.peak_market_cap = dec!(1350000);
        signal.tp_stage = 1;
        signal.updated_at = 60_000;

        store
            .record_market_update(&TokenMarketUpdate { token: &token, snapshot: &snapshot("A", 60_000), signal: Some(&signal) })
            .unwrap();

        let stored = store.open_signal("A").unwrap().unwrap();
        assert_eq!(stored.tp_stage, 1);
        assert_eq!(stored.peak_market_cap, dec!(1350000));
        assert_eq!(store.token("A").unwrap().unwrap().market_cap, Some(1_350_000.0));
        assert_eq!(store.snapshot_count("A").unwrap(), 1);
    }

    #[test]
    fn test_second_open_signal_conflicts() {
        let store = store();
        let new = NewSignal::new("A".to_string(), dec!(500000.5), 10).unwrap();
        let first = store.insert_signal(&new).unwrap();
        assert_eq!(first.start_market_cap, dec!(500000.5));
        assert!(matches!(store.insert_signal(&new), Err(StoreError::Conflict(_))));
    }

    #[test]
    fn test_indicator_rows_round_trip_through_tables() {
        let store = store();
        let transition = TransitionState {
            state: TransitionPhase::Watch,
            satisfied: 3,
            conditions: TransitionConditions { breakout_confirmed: true, support_holding: true, ..Default::default() },
        };
        store.upsert_indicator("A", &IndicatorRow::Transition(transition.clone()), 1).unwrap();
        store
            .upsert_indicator(
                "A",
                &IndicatorRow::Risk(RiskProfile {
                    risk_level: RiskLevel::High,
                    expected_move: ExpectedMove::Double,
                    failure_risk: 65.0,
                    setup_quality: 40.0,
                }),
                1,
            )
            .unwrap();

        let indicators = store.indicators("A").unwrap();
        assert_eq!(indicators.transition, Some(transition));
        assert_eq!(indicators.risk.map(|r| r.expected_move), Some(ExpectedMove::Double));
        assert!(indicators.pump.is_none());
    }

    #[test]
    fn test_dead_token_purge_clears_every_table() {
        let store = store();
        store.upsert_discovered(&discovered("A", None), 0).unwrap();
        store.insert_snapshot(&snapshot("A", 1)).unwrap();
        store.upsert_candles("A", Timeframe::H1, &[Candle::new(0, 1.0, 1.0, 1.0, 1.0, 1.0)]).unwrap();
        let levels = SupportResistance {
            supports: vec![Level { price: 1.0, strength: 0.5, touches: 2, first_touch: 0 }],
            resistances: vec![],
            last_calculated_at: 0,
        };
        store.upsert_support_resistance("A", Timeframe::H1, &levels, 1).unwrap();
        store.insert_signal(&NewSignal::new("A".to_string(), dec!(100), 0).unwrap()).unwrap();

        store.mark_dead("A", 5).unwrap();
        assert_eq!(store.candle_count("A").unwrap(), 0);
        assert!(store.support_resistance("A", Timeframe::H1).unwrap().is_none());

        assert_eq!(store.purge_dead_tokens().unwrap(), 1);
        assert!(store.token("A").unwrap().is_none());
        assert!(store.signals().unwrap().is_empty());
    }

    #[test]
    fn test_prune_keeps_latest_per_series() {
        let store = store();
        let candles: Vec<Candle> = (0..6).map(|i| Candle::new(i, 1.0, 1.0, 1.0, 1.0, 1.0)).collect();
        store.upsert_candles("A", Timeframe::M15, &candles).unwrap();
        store.upsert_candles("B", Timeframe::M15, &candles[..2]).unwrap();

        let policy = RetentionPolicy { candles_per_timeframe: 3, ..Default::default() };
        let report = store.prune_history(&policy).unwrap();

        assert_eq!(report.candles_pruned, 3);
        let kept: Vec<i64> = store.recent_candles("A", Timeframe::M15, None).unwrap().iter().map(|c| c.timestamp).collect();
        assert_eq!(kept, vec![3, 4, 5]);
        assert_eq!(store.candle_count("B").unwrap(), 2);
    }

    #[test]
    fn test_opens_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("oracle.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.upsert_discovered(&discovered("A", None), 0).unwrap();
        }
        let reopened = SqliteStore::open(&path).unwrap();
        assert!(reopened.token("A").unwrap().is_some());
    }
}
