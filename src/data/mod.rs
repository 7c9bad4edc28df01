/// Data layer: core types, loading, column detection, and filtering.
///
/// Architecture:
/// ```text
///  .csv / .json / .parquet   file dialog   synthetic
///        │                       │             │
///        └───────────┬───────────┴─────────────┘
///                    ▼
///              ┌──────────┐
///              │  loader   │  parse source → Table
///              └──────────┘
///                    │
///                    ▼
///              ┌──────────┐
///              │  Table    │  named columns of Value cells
///              └──────────┘
///               │        │
///               ▼        ▼
///        ┌──────────┐ ┌──────────┐
///        │  detect   │ │  filter   │  header rules → mapping,
///        └──────────┘ └──────────┘  row rules → kept indices
/// ```
///
/// `writer` goes the other way and saves a `Table` as CSV or Parquet.

pub mod detect;
pub mod filter;
pub mod loader;
pub mod model;
pub mod synthetic;
pub mod writer;
