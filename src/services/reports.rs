// Report service
// Append-only moderation flags against brands, products, stores and accounts.

use crate::access::{self, Actor};
use crate::db::{DbReport, ReportTable};
use crate::entity::ContentKind;
use crate::error::CatalogError;
use crate::state::AppState;
use crate::status::ResponseStatus;
use crate::types::{CatalogReportType, StoreReportType, UserAccountReportType};
use crate::validation::validate_description;

/// A report as submitted. `report_type` is the raw wire value; each target
/// kind has its own set of reasons.
#[derive(Debug, Clone, Default)]
pub struct NewReport {
    pub target_id: i64,
    pub report_type: i64,
    pub comment: Option<String>,
}

fn bad_report_type() -> CatalogError {
    CatalogError::bad_param("report_type", "must be a valid report type for this target.")
}

fn report_content(
    state: &AppState,
    actor: &Actor,
    kind: ContentKind,
    table: ReportTable,
    report_type: i64,
    req: &NewReport,
) -> Result<DbReport, CatalogError> {
    let comment = validate_description(req.comment.as_deref())?;
    let db = state.db();
    access::visible_state(&db, kind, req.target_id)?;
    let report = db.insert_report(table, req.target_id, actor.id, report_type, comment.as_deref())?;
    log::info!(
        "Account {} reported {} {} (type {})",
        actor.id,
        kind.label(),
        req.target_id,
        report_type
    );
    Ok(report)
}

pub fn report_brand(state: &AppState, actor: &Actor, req: NewReport) -> Result<DbReport, CatalogError> {
    let kind = CatalogReportType::from_i64(req.report_type).ok_or_else(bad_report_type)?;
    report_content(state, actor, ContentKind::Brand, ReportTable::Brand, kind.as_i64(), &req)
}

pub fn report_product(state: &AppState, actor: &Actor, req: NewReport) -> Result<DbReport, CatalogError> {
    let kind = CatalogReportType::from_i64(req.report_type).ok_or_else(bad_report_type)?;
    report_content(state, actor, ContentKind::Product, ReportTable::Product, kind.as_i64(), &req)
}

pub fn report_store(state: &AppState, actor: &Actor, req: NewReport) -> Result<DbReport, CatalogError> {
    let kind = StoreReportType::from_i64(req.report_type).ok_or_else(bad_report_type)?;
    report_content(state, actor, ContentKind::Store, ReportTable::Store, kind.as_i64(), &req)
}

pub fn report_user_account(state: &AppState, actor: &Actor, req: NewReport) -> Result<DbReport, CatalogError> {
    let kind = UserAccountReportType::from_i64(req.report_type).ok_or_else(bad_report_type)?;
    if req.target_id == actor.id {
        return Err(CatalogError::bad_param(
            "user_account_id",
            "cannot be your own account.",
        ));
    }
    let comment = validate_description(req.comment.as_deref())?;

    let db = state.db();
    if db.get_user_account(req.target_id)?.is_none() {
        return Err(CatalogError::not_found(
            ResponseStatus::UserAccountNotFound,
            "No user account exists for this ID.",
        ));
    }
    let report = db.insert_report(
        ReportTable::UserAccount,
        req.target_id,
        actor.id,
        kind.as_i64(),
        comment.as_deref(),
    )?;
    log::info!("Account {} reported account {}", actor.id, req.target_id);
    Ok(report)
}
