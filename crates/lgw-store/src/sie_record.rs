// SPDX-License-Identifier: MIT OR Apache-2.0
//! Stored SIE uploads: the full record and the listing view.

use chrono::{DateTime, Utc};
use lgw_sie::{KpiReport, SieDocument};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored SIE file with its parsed structure and computed KPIs.
///
/// Scoped by `(connectionId, fiscalYear, sieType)`: storing a second file
/// with the same scope overwrites the first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SieRecord {
    /// Upload identifier.
    pub upload_id: Uuid,
    /// Owning connection.
    pub connection_id: Uuid,
    /// Fiscal year of the file (start-date year).
    pub fiscal_year: i32,
    /// SIE type 1 through 4.
    pub sie_type: u8,
    /// Original file name, for uploads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Company name from the file metadata.
    pub company_name: String,
    /// Organization number from the file metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_number: Option<String>,
    /// Parsed structure.
    pub parsed: SieDocument,
    /// Computed KPI vector.
    pub kpis: KpiReport,
    /// Normalized source text, preserved for re-export.
    pub raw_content: String,
    /// When the file was stored.
    pub uploaded_at: DateTime<Utc>,
}

impl SieRecord {
    /// Build a record from a parsed document and its KPIs.
    pub fn new(
        connection_id: Uuid,
        file_name: Option<String>,
        parsed: SieDocument,
        kpis: KpiReport,
    ) -> Self {
        Self {
            upload_id: Uuid::new_v4(),
            connection_id,
            fiscal_year: parsed.fiscal_year(),
            sie_type: parsed.metadata.sie_type,
            file_name,
            company_name: parsed.metadata.company_name.clone(),
            org_number: parsed.metadata.org_number.clone(),
            raw_content: parsed.raw_content.clone(),
            parsed,
            kpis,
            uploaded_at: Utc::now(),
        }
    }

    /// The listing view of this record.
    pub fn meta(&self) -> SieUploadMeta {
        SieUploadMeta {
            upload_id: self.upload_id,
            connection_id: self.connection_id,
            fiscal_year: self.fiscal_year,
            sie_type: self.sie_type,
            file_name: self.file_name.clone(),
            company_name: self.company_name.clone(),
            org_number: self.org_number.clone(),
            uploaded_at: self.uploaded_at,
        }
    }
}

/// Listing view of a stored SIE file, without the parsed payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SieUploadMeta {
    /// Upload identifier.
    pub upload_id: Uuid,
    /// Owning connection.
    pub connection_id: Uuid,
    /// Fiscal year.
    pub fiscal_year: i32,
    /// SIE type.
    pub sie_type: u8,
    /// Original file name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Company name.
    pub company_name: String,
    /// Organization number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_number: Option<String>,
    /// When the file was stored.
    pub uploaded_at: DateTime<Utc>,
}
