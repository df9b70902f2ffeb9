/*!
# Assets Audit

A browser-based editor for an asset register kept in a single spreadsheet
file, built in Rust.

## Overview

The register is the first sheet of an XLSX workbook (`assets.xlsx` by
default): a header row followed by one record per row. Each record has a
`SITEID` identifier, a `SITENAME` display name and any number of further
columns. A user searches records by site id, opens a record, edits its
non-key fields and saves; every save rewrites the whole workbook. The
current workbook can be downloaded at any time.

## Architecture

### Storage Layer
- **loader**: reads the first worksheet into a [`record::Dataset`]
- **downloader**: serialises a dataset back to XLSX bytes
- **saving**: replaces the backing file atomically (temp file + rename)
- **store**: the [`store::Storage`] seam and its [`store::XlsxStore`] implementation

### Session Layer
- **cache**: keeps the dataset in memory between interactions, re-reads
  after invalidation
- **audit**: search, edit drafts, submit, download, per-row view state and
  user notices

### Web Layer (feature `web`)
- **app**: axum routes, server-rendered page and JSON API
- **config**: command line / environment settings

## Known limitations

- No locking: two processes editing the same file means the last writer wins.
- Values are stored as submitted text; there is no typed validation.

## REST API Endpoints

- `GET /?siteid=<q>` - Page with search results and the full register
- `POST /assets/{siteid}/{ordinal}` - Form submit of an edit
- `GET /download` - Current workbook as `assets.xlsx`
- `POST /refresh` - Drop the cached register
- `GET /api/assets` - Full register as JSON
- `GET /api/search?siteid=<q>` - Search results as JSON
- `POST /api/assets/{siteid}/{ordinal}` - JSON edit
*/

pub mod audit;
pub mod cache;
pub mod downloader;
pub mod error;
pub mod loader;
pub mod record;
pub mod saving;
pub mod store;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod config;

pub use audit::*;
pub use error::*;
pub use record::*;
pub use store::*;
