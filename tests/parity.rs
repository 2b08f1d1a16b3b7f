//! The catalog source and the DDL source must agree row for row.
//!
//! The catalog side is fed hand-written INFORMATION_SCHEMA result rows, in
//! the shape and order the fixed queries return them from a real database.

use std::collections::HashMap;

use pretty_assertions::assert_eq;

use spangen::error::SpangenError;
use spangen::introspect::catalog::{CatalogQuery, CatalogValue, Row, Statement};
use spangen::introspect::{CatalogClient, CatalogSource, DdlSource, SchemaSource, PRIMARY_KEY_INDEX};

/// Canned answers to the four catalog queries, keyed by their parameters
#[derive(Default)]
struct CannedCatalog {
    tables: Vec<Row>,
    columns: HashMap<String, Vec<Row>>,
    indexes: HashMap<String, Vec<Row>>,
    index_columns: HashMap<(String, String), Vec<Row>>,
}

impl CannedCatalog {
    /// Tables must be added in TABLE_NAME order
    fn table(mut self, name: &str, parent: Option<&str>, columns: Vec<Row>) -> Self {
        let parent = parent.map_or(CatalogValue::Null, string);
        self.tables.push(Row(vec![string(name), parent]));
        self.columns.insert(name.to_string(), columns);
        self
    }

    fn primary_key(mut self, table: &str, columns: &[&str]) -> Self {
        let rows = columns
            .iter()
            .enumerate()
            .map(|(i, column)| key(i as i64 + 1, column))
            .collect();
        self.index_columns
            .insert((table.to_string(), PRIMARY_KEY_INDEX.to_string()), rows);
        self
    }

    /// Indexes of one table must be added in INDEX_NAME order
    fn index(mut self, table: &str, name: &str, unique: bool, columns: Vec<Row>) -> Self {
        self.indexes
            .entry(table.to_string())
            .or_default()
            .push(Row(vec![string(name), CatalogValue::Bool(unique)]));
        self.index_columns
            .insert((table.to_string(), name.to_string()), columns);
        self
    }
}

fn param<'a>(statement: &'a Statement, name: &str) -> &'a str {
    statement
        .params
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, v)| v.as_str())
        .unwrap_or_else(|| panic!("missing @{name} in {:?}", statement.query))
}

impl CatalogClient for CannedCatalog {
    fn query(&mut self, statement: &Statement) -> Result<Vec<Row>, SpangenError> {
        let rows = match statement.query {
            CatalogQuery::Tables => Some(&self.tables),
            CatalogQuery::Columns => self.columns.get(param(statement, "table")),
            CatalogQuery::Indexes => self.indexes.get(param(statement, "table")),
            CatalogQuery::IndexColumns => self.index_columns.get(&(
                param(statement, "table").to_string(),
                param(statement, "index").to_string(),
            )),
        };
        Ok(rows.cloned().unwrap_or_default())
    }
}

fn string(s: &str) -> CatalogValue {
    CatalogValue::String(s.to_string())
}

/// A COLUMNS row. `is_nullable` and `is_generated` take the raw
/// INFORMATION_SCHEMA values and are compared the way the query does.
fn column(
    name: &str,
    ordinal: i64,
    is_nullable: &str,
    spanner_type: &str,
    is_generated: &str,
    primary_key: bool,
) -> Row {
    Row(vec![
        string(name),
        // gcloud renders INT64 as a JSON string
        string(&ordinal.to_string()),
        CatalogValue::Bool(is_nullable == "NO"),
        string(spanner_type),
        CatalogValue::Bool(primary_key),
        CatalogValue::Bool(is_generated == "ALWAYS"),
    ])
}

fn key(ordinal: i64, name: &str) -> Row {
    Row(vec![CatalogValue::Int(ordinal), string(name)])
}

/// Storing columns have no ordinal position
fn storing(name: &str) -> Row {
    Row(vec![CatalogValue::Null, string(name)])
}

const SIMPLE: &str = "
    CREATE TABLE Simple (Id INT64 NOT NULL, Value STRING(32) NOT NULL) PRIMARY KEY(Id);
    CREATE INDEX SimpleIndex ON Simple(Value);
    CREATE UNIQUE INDEX SimpleIndex2 ON Simple(Id, Value);";

fn simple_catalog() -> CannedCatalog {
    CannedCatalog::default()
        .table(
            "Simple",
            None,
            vec![
                column("Id", 1, "NO", "INT64", "NEVER", true),
                column("Value", 2, "NO", "STRING(32)", "NEVER", false),
            ],
        )
        .primary_key("Simple", &["Id"])
        .index("Simple", "SimpleIndex", false, vec![key(1, "Value")])
        .index("Simple", "SimpleIndex2", true, vec![key(1, "Id"), key(2, "Value")])
}

const MAX_LENGTH: &str = "
    CREATE TABLE Blobs (
        Id INT64 NOT NULL,
        Name STRING(MAX) NOT NULL,
        Data BYTES(MAX),
    ) PRIMARY KEY(Id);";

fn max_length_catalog() -> CannedCatalog {
    CannedCatalog::default()
        .table(
            "Blobs",
            None,
            vec![
                column("Id", 1, "NO", "INT64", "NEVER", true),
                column("Name", 2, "NO", "STRING(MAX)", "NEVER", false),
                column("Data", 3, "YES", "BYTES(MAX)", "NEVER", false),
            ],
        )
        .primary_key("Blobs", &["Id"])
}

const INTERLEAVED: &str = "
    CREATE TABLE Parent(Id INT64 NOT NULL) PRIMARY KEY(Id);
    CREATE TABLE Interleaved(InterleavedId INT64 NOT NULL, Id INT64 NOT NULL, Value INT64 NOT NULL)
        PRIMARY KEY(Id, InterleavedId), INTERLEAVE IN PARENT Parent;
    CREATE INDEX InterleavedByValue ON Interleaved(Id, Value), INTERLEAVE IN Parent;";

fn interleaved_catalog() -> CannedCatalog {
    CannedCatalog::default()
        .table(
            "Interleaved",
            Some("Parent"),
            vec![
                column("InterleavedId", 1, "NO", "INT64", "NEVER", true),
                column("Id", 2, "NO", "INT64", "NEVER", true),
                column("Value", 3, "NO", "INT64", "NEVER", false),
            ],
        )
        .primary_key("Interleaved", &["Id", "InterleavedId"])
        .index(
            "Interleaved",
            "InterleavedByValue",
            false,
            vec![key(1, "Id"), key(2, "Value")],
        )
        .table(
            "Parent",
            None,
            vec![column("Id", 1, "NO", "INT64", "NEVER", true)],
        )
        .primary_key("Parent", &["Id"])
}

const FOREIGN_KEY: &str = "
    CREATE TABLE Items(ID INT64 NOT NULL) PRIMARY KEY(ID);
    CREATE TABLE ForeignItems(ID INT64 NOT NULL, ItemID INT64 NOT NULL,
        CONSTRAINT FK FOREIGN KEY (ItemID) REFERENCES Items(ID)) PRIMARY KEY(ID);";

/// The backing index Spanner creates for the foreign key is managed and
/// filtered out by the index query
fn foreign_key_catalog() -> CannedCatalog {
    CannedCatalog::default()
        .table(
            "ForeignItems",
            None,
            vec![
                column("ID", 1, "NO", "INT64", "NEVER", true),
                column("ItemID", 2, "NO", "INT64", "NEVER", false),
            ],
        )
        .primary_key("ForeignItems", &["ID"])
        .table(
            "Items",
            None,
            vec![column("ID", 1, "NO", "INT64", "NEVER", true)],
        )
        .primary_key("Items", &["ID"])
}

const SINGERS: &str = "
    CREATE TABLE Singers (
        SingerId INT64 NOT NULL,
        FirstName STRING(1024),
        LastName STRING(1024),
        FullName STRING(2048) AS (ARRAY_TO_STRING([FirstName, LastName], \" \")) STORED,
        Tags ARRAY<STRING(16)>,
        Bio BYTES(MAX),
    ) PRIMARY KEY(SingerId);
    CREATE UNIQUE NULL_FILTERED INDEX SingersByName ON Singers(LastName, FirstName DESC) STORING (Bio, Tags);";

fn singers_catalog() -> CannedCatalog {
    CannedCatalog::default()
        .table(
            "Singers",
            None,
            vec![
                column("SingerId", 1, "NO", "INT64", "NEVER", true),
                column("FirstName", 2, "YES", "STRING(1024)", "NEVER", false),
                column("LastName", 3, "YES", "STRING(1024)", "NEVER", false),
                column("FullName", 4, "YES", "STRING(2048)", "ALWAYS", false),
                column("Tags", 5, "YES", "ARRAY<STRING(16)>", "NEVER", false),
                column("Bio", 6, "YES", "BYTES(MAX)", "NEVER", false),
            ],
        )
        .primary_key("Singers", &["SingerId"])
        // ORDER BY ORDINAL_POSITION returns the NULL (storing) rows last
        .index(
            "Singers",
            "SingersByName",
            true,
            vec![
                key(1, "LastName"),
                key(2, "FirstName"),
                storing("Bio"),
                storing("Tags"),
            ],
        )
}

fn assert_parity(ddl: &str, mut canned: CannedCatalog) {
    let mut direct = DdlSource::parse(ddl).unwrap();
    let mut catalog = CatalogSource::new(&mut canned);

    let tables = direct.table_list().unwrap();
    assert_eq!(catalog.table_list().unwrap(), tables);

    for table in &tables {
        let name = &table.table_name;
        assert_eq!(
            catalog.column_list(name).unwrap(),
            direct.column_list(name).unwrap(),
            "columns of {name}"
        );
        assert_eq!(
            catalog.index_column_list(name, PRIMARY_KEY_INDEX).unwrap(),
            direct.index_column_list(name, PRIMARY_KEY_INDEX).unwrap(),
            "primary key of {name}"
        );

        let indexes = direct.index_list(name).unwrap();
        assert_eq!(catalog.index_list(name).unwrap(), indexes, "indexes of {name}");
        for index in &indexes {
            assert_eq!(
                catalog.index_column_list(name, &index.index_name).unwrap(),
                direct.index_column_list(name, &index.index_name).unwrap(),
                "index {}",
                index.index_name
            );
        }
    }
}

#[test]
fn simple_table_parity() {
    assert_parity(SIMPLE, simple_catalog());
}

#[test]
fn max_length_parity() {
    assert_parity(MAX_LENGTH, max_length_catalog());
}

#[test]
fn interleaved_parity() {
    assert_parity(INTERLEAVED, interleaved_catalog());
}

#[test]
fn foreign_key_parity() {
    assert_parity(FOREIGN_KEY, foreign_key_catalog());
}

#[test]
fn generated_and_storing_parity() {
    assert_parity(SINGERS, singers_catalog());
}

#[test]
fn storing_columns_lead_index_columns() {
    let mut canned = singers_catalog();
    let columns = CatalogSource::new(&mut canned)
        .index_column_list("Singers", "SingersByName")
        .unwrap();

    let summary: Vec<_> = columns
        .iter()
        .map(|c| (c.seq_no, c.column_name.as_str(), c.storing))
        .collect();
    assert_eq!(
        summary,
        vec![
            (0, "Bio", true),
            (0, "Tags", true),
            (1, "LastName", false),
            (2, "FirstName", false),
        ]
    );
}

#[test]
fn diverging_rows_are_detected() {
    // a column the DDL declares NOT NULL reported as nullable by the catalog
    let mut canned = CannedCatalog::default()
        .table(
            "Simple",
            None,
            vec![
                column("Id", 1, "NO", "INT64", "NEVER", true),
                column("Value", 2, "YES", "STRING(32)", "NEVER", false),
            ],
        )
        .primary_key("Simple", &["Id"]);
    let mut direct = DdlSource::parse(SIMPLE).unwrap();

    let catalog_columns = CatalogSource::new(&mut canned).column_list("Simple").unwrap();
    assert_ne!(catalog_columns, direct.column_list("Simple").unwrap());
}

#[test]
fn unknown_table_has_no_rows() {
    let mut canned = simple_catalog();
    let mut catalog = CatalogSource::new(&mut canned);
    assert!(catalog.column_list("Missing").unwrap().is_empty());
    assert!(catalog.index_list("Missing").unwrap().is_empty());
}
