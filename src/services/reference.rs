// Reference service
// Read-only lookups: countries, dialing codes, localities, colours, materials.

use crate::db::{DbCountry, DbDialingCode, DbLocality, DbProductColor, DbProductMaterial};
use crate::error::CatalogError;
use crate::state::AppState;
use crate::validation::clean_locality_name;

pub fn get_country_list(state: &AppState, is_enabled: Option<bool>) -> Result<Vec<DbCountry>, CatalogError> {
    Ok(state.db().countries(is_enabled)?)
}

pub fn get_dialing_code_list(
    state: &AppState,
    is_enabled: Option<bool>,
) -> Result<Vec<DbDialingCode>, CatalogError> {
    Ok(state.db().dialing_codes(is_enabled)?)
}

pub fn get_localities(state: &AppState, query: &str) -> Result<Vec<DbLocality>, CatalogError> {
    let query = clean_locality_name(query);
    if query.is_empty() {
        return Err(CatalogError::bad_param("query", "must be a non-empty string."));
    }
    Ok(state.db().search_localities(&query)?)
}

pub fn get_product_color_list(state: &AppState) -> Result<Vec<DbProductColor>, CatalogError> {
    Ok(state.db().product_colors()?)
}

pub fn get_product_material_list(state: &AppState) -> Result<Vec<DbProductMaterial>, CatalogError> {
    Ok(state.db().product_materials()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::test_state;

    #[test]
    fn test_enabled_filter() {
        let t = test_state();
        let all = get_country_list(&t.state, None).unwrap();
        let enabled = get_country_list(&t.state, Some(true)).unwrap();
        assert!(all.len() > enabled.len());
        assert!(enabled.iter().all(|c| c.is_enabled));
        assert!(enabled.iter().any(|c| c.alpha_2_code == "AE"));

        let codes = get_dialing_code_list(&t.state, Some(true)).unwrap();
        assert!(codes.iter().any(|d| d.dialing_code == "971"));
    }

    #[test]
    fn test_localities_search() {
        let t = test_state();
        {
            let db = t.state.db();
            let ae = db.country_id_by_alpha_2("AE").unwrap().unwrap();
            db.get_or_create_locality(ae, "Dubai").unwrap();
            db.get_or_create_locality(ae, "Abu Dhabi").unwrap();
        }
        let found = get_localities(&t.state, "  dub ").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Dubai");
        assert!(get_localities(&t.state, "   ").is_err());
    }

    #[test]
    fn test_product_reference_lists() {
        let t = test_state();
        assert!(get_product_color_list(&t.state)
            .unwrap()
            .iter()
            .any(|c| c.code == "RED"));
        assert_eq!(get_product_material_list(&t.state).unwrap().len(), 7);
    }
}
