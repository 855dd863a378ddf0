//! Record types, destination tables, and parsed rows

use serde::{Deserialize, Serialize};

/// Destination table: generated `_id` primary key plus fixed TEXT columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Table {
    pub name: &'static str,
    pub columns: &'static [&'static str],
}

impl Table {
    /// `CREATE TABLE` statement for this table
    pub fn create_sql(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|c| format!("{c} TEXT"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("CREATE TABLE {} (_id SERIAL PRIMARY KEY, {})", self.name, columns)
    }
}

pub const EVENTS: Table = Table {
    name: "events",
    columns: &[
        "num_acc", "an", "mois", "jour", "hrmn", "lum", "agg", "int", "atm", "col", "com", "adr",
        "gps", "lat", "long", "dep", "catr", "voie", "v1", "v2", "circ", "nbv", "pr", "pr1",
        "vosp", "prof", "plan", "lartpc", "larrout", "surf", "infra", "situ", "env1", "vma",
    ],
};

pub const VEHICLES: Table = Table {
    name: "vehicles",
    columns: &[
        "id_vehicule", "num_veh", "num_acc", "senc", "catv", "occutc", "obs", "obsm", "choc",
        "manv", "motor",
    ],
};

pub const USERS: Table = Table {
    name: "users",
    columns: &[
        "id_vehicule", "num_veh", "num_acc", "place", "catu", "grav", "sexe", "an_nais", "trajet",
        "secu", "secu1", "secu2", "secu3", "locp", "actp", "etatp",
    ],
};

/// Tables dropped and recreated on every run, in reset order
pub const TABLES: [Table; 3] = [EVENTS, VEHICLES, USERS];

/// The four accident record categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    Characteristics,
    Places,
    Vehicles,
    Users,
}

impl RecordType {
    /// Processing order
    pub const ALL: [RecordType; 4] = [
        RecordType::Characteristics,
        RecordType::Places,
        RecordType::Vehicles,
        RecordType::Users,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Characteristics => "characteristics",
            RecordType::Places => "places",
            RecordType::Vehicles => "vehicles",
            RecordType::Users => "users",
        }
    }

    /// Subdirectory of the ingestion root holding this type's CSV files
    pub fn dir_name(&self) -> &'static str {
        match self {
            RecordType::Characteristics => "0_caracteristiques",
            RecordType::Places => "1_lieux",
            RecordType::Vehicles => "2_vehicules",
            RecordType::Users => "3_usagers",
        }
    }

    /// Backing table, if the schema has one. Places has none.
    pub fn table(&self) -> Option<&'static Table> {
        match self {
            RecordType::Characteristics => Some(&EVENTS),
            RecordType::Places => None,
            RecordType::Vehicles => Some(&VEHICLES),
            RecordType::Users => Some(&USERS),
        }
    }

    /// Table rows of this type are written to.
    ///
    /// Only characteristics are wired; vehicles and users have tables but no
    /// agreed column mapping yet, so their chunks are parsed and skipped.
    pub fn persisted_table(&self) -> Option<&'static Table> {
        match self {
            RecordType::Characteristics => self.table(),
            RecordType::Places | RecordType::Vehicles | RecordType::Users => None,
        }
    }
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Header and data rows parsed from one delimited file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    /// Lowercased column names
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Bounded slice of a table's rows, submitted as one insert statement
#[derive(Debug, Clone, Copy)]
pub struct Chunk<'a> {
    pub header: &'a [String],
    pub rows: &'a [Vec<String>],
    /// Index of the first row within the parsed table
    pub offset: usize,
}

impl Chunk<'_> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Map a parsed cell to its bound value: the empty string becomes SQL NULL.
pub fn cell_value(cell: &str) -> Option<&str> {
    if cell.is_empty() {
        None
    } else {
        Some(cell)
    }
}
