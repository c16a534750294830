//! SQLite schema definition.

/// Complete database schema.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Collection records
-- ============================================================================

-- Every collection shares one table; `data` holds the record's fields as a
-- JSON object.
CREATE TABLE IF NOT EXISTS records (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    data TEXT NOT NULL DEFAULT '{}' CHECK (json_valid(data) AND json_type(data) = 'object'),
    created TEXT NOT NULL,
    updated TEXT NOT NULL,
    PRIMARY KEY (collection, id)
);

CREATE INDEX IF NOT EXISTS idx_records_created ON records(collection, created);
"#;
