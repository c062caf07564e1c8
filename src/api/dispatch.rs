//! Endpoint handlers: form fields in, service call, JSON payload out.

use std::collections::BTreeMap;

use serde_json::json;

use super::form::Form;
use super::{cleared_session_cookie, session_cookie, Call, Endpoint, Reply};
use crate::access::Actor;
use crate::error::CatalogError;
use crate::media::UploadedFile;
use crate::services::auth::{self, JoinRequest, LogInRequest, SessionGrant};
use crate::services::brands::{self, CreateBrand, UpdateBrand};
use crate::services::products::{
    self, CreateProduct, MediumMetadata, ProductFields, UpdateProduct, UpdateProductMedia,
};
use crate::services::reports::{self, NewReport};
use crate::services::store_products::{
    self, CreateStoreProduct, ListingFields, UpdateStoreProduct,
};
use crate::services::stores::{self, AddressInput, CreateStore, StoreQuery, UpdateStore};
use crate::services::verification::{self, SendCode};
use crate::services::{accounts, reference, EntityRef};
use crate::status::ResponseStatus;
use crate::types::{MediaMode, ProductStatus, StoreProductStatus, StoreStatus};

pub fn dispatch(call: &Call<'_>, actor: Option<&Actor>) -> Result<Reply, CatalogError> {
    let f = &call.form;
    let state = call.state;
    match call.endpoint {
        // Identity
        Endpoint::CheckAlias | Endpoint::CheckBrandAlias => {
            let alias = accounts::check_alias(state, f.opt_str("alias").unwrap_or_default())?;
            Ok(Reply::json(json!({ "alias": alias })))
        }
        Endpoint::SendVerificationCode => {
            let phone_number_id = verification::send_verification_code(
                state,
                SendCode {
                    alpha_2_code: f.opt_string("alpha_2_code").unwrap_or_default(),
                    dialing_code: f.opt_string("dialing_code").unwrap_or_default(),
                    phone_number: f.opt_string("phone_number").unwrap_or_default(),
                },
            )?;
            Ok(Reply::json(json!({ "phone_number_id": phone_number_id })))
        }
        Endpoint::CheckVerificationCode => {
            let verified = verification::check_verification_code(
                state,
                f.id("phone_number_id")?,
                f.opt_str("verification_code").unwrap_or_default(),
            )?;
            Ok(Reply::json(json!(verified)))
        }
        Endpoint::Join => {
            let grant = auth::join(
                state,
                JoinRequest {
                    phone_number_id: f.id("phone_number_id")?,
                    verification_code: f.opt_string("verification_code").unwrap_or_default(),
                    alias: f.opt_string("alias").unwrap_or_default(),
                },
                call.client,
            )?;
            Ok(session_reply(call, grant))
        }
        Endpoint::LogIn => {
            let grant = auth::log_in(
                state,
                LogInRequest {
                    phone_number_id: f.id("phone_number_id")?,
                    verification_code: f.opt_string("verification_code").unwrap_or_default(),
                    user_account_id: f.id("user_account_id")?,
                },
                call.client,
            )?;
            Ok(session_reply(call, grant))
        }
        Endpoint::LogOut => {
            auth::log_out(state, call.session_id.unwrap_or_default())?;
            Ok(Reply::json(json!({}))
                .with_header("Set-Cookie", cleared_session_cookie(state.config.secure_cookies)))
        }
        Endpoint::Heartbeat => {
            let actor = signed_in(actor)?;
            Ok(Reply::json(json!({ "user_account_id": actor.id })))
        }
        Endpoint::Me => {
            let account = accounts::me(state, signed_in(actor)?)?;
            Ok(Reply::json(json!({ "user_account": account })))
        }
        Endpoint::GetUserAccount => {
            let target = EntityRef::from_parts(
                f.opt_id("user_account_id")?,
                f.opt_string("alias"),
                "user_account_id",
            )?;
            let account = accounts::get_user_account(state, &target)?;
            Ok(Reply::json(json!({ "user_account": account })))
        }
        Endpoint::GetUserAccounts => {
            let accounts = accounts::get_user_accounts(state, f.opt_str("query").unwrap_or_default())?;
            Ok(Reply::json(json!({ "user_accounts": accounts })))
        }
        Endpoint::DeleteUserAccount => {
            let id = accounts::delete_user_account(state, signed_in(actor)?, f.id("user_account_id")?)?;
            Ok(Reply::json(json!({ "user_account_id": id })))
        }

        // Brands
        Endpoint::CreateBrand => {
            let brand = brands::create_brand(
                state,
                signed_in(actor)?,
                CreateBrand {
                    alias: f.opt_string("alias").unwrap_or_default(),
                    name: f.opt_string("name").unwrap_or_default(),
                    description: f.opt_string("description"),
                    website: f.opt_string("website"),
                    tags: f.opt_tags()?.unwrap_or_default(),
                },
            )?;
            Ok(Reply::json(json!({ "brand": brand })))
        }
        Endpoint::GetBrand => {
            let target = EntityRef::from_parts(f.opt_id("brand_id")?, f.opt_string("alias"), "brand_id")?;
            Ok(Reply::json(json!({ "brand": brands::get_brand(state, &target)? })))
        }
        Endpoint::GetBrands => {
            let brands = brands::get_brands(state, f.opt_str("query").unwrap_or_default(), f.page()?)?;
            Ok(Reply::json(json!({ "brands": brands })))
        }
        Endpoint::UpdateBrand => {
            let brand = brands::update_brand(
                state,
                signed_in(actor)?,
                UpdateBrand {
                    brand_id: f.id("brand_id")?,
                    name: f.opt_string("name").unwrap_or_default(),
                    description: f.opt_string("description"),
                    website: f.opt_string("website"),
                    tags: f.opt_tags()?.unwrap_or_default(),
                },
            )?;
            Ok(Reply::json(json!({ "brand": brand })))
        }
        Endpoint::UpdateBrandAvatar => {
            let file = required_file(&call.files, "avatar")?;
            let brand = brands::update_brand_avatar(state, signed_in(actor)?, f.id("brand_id")?, file)?;
            Ok(Reply::json(json!({ "brand": brand })))
        }
        Endpoint::RemoveBrand => {
            let visibility = brands::remove_brand(state, signed_in(actor)?, f.id("brand_id")?)?;
            Ok(Reply::json(json!({ "visibility": visibility })))
        }
        Endpoint::DeleteBrand => {
            let id = brands::delete_brand(state, signed_in(actor)?, f.id("brand_id")?)?;
            Ok(Reply::json(json!({ "brand_id": id })))
        }

        // Products
        Endpoint::CreateProduct => {
            let product = products::create_product(
                state,
                signed_in(actor)?,
                CreateProduct {
                    alias: f.opt_string("alias").unwrap_or_default(),
                    brand_id: f.id("brand_id")?,
                    fields: product_fields(f)?,
                    tags: f.opt_tags()?.unwrap_or_default(),
                },
            )?;
            Ok(Reply::json(json!({ "product": product })))
        }
        Endpoint::GetProduct => {
            let target =
                EntityRef::from_parts(f.opt_id("product_id")?, f.opt_string("alias"), "product_id")?;
            Ok(Reply::json(json!({ "product": products::get_product(state, &target)? })))
        }
        Endpoint::GetProducts => {
            let products = products::get_products(
                state,
                f.opt_str("query").unwrap_or_default(),
                f.opt_id("brand_id")?,
                f.page()?,
            )?;
            Ok(Reply::json(json!({ "products": products })))
        }
        Endpoint::GetProductVariants => {
            let products = products::get_product_variants(state, f.id("product_id")?, f.page()?)?;
            Ok(Reply::json(json!({ "products": products })))
        }
        Endpoint::UpdateProduct => {
            let product = products::update_product(
                state,
                signed_in(actor)?,
                UpdateProduct {
                    product_id: f.id("product_id")?,
                    fields: product_fields(f)?,
                    tags: f.opt_tags()?,
                },
            )?;
            Ok(Reply::json(json!({ "product": product })))
        }
        Endpoint::UpdateProductMedia => {
            let metadata: BTreeMap<String, MediumMetadata> = match f.opt_str("metadata") {
                Some(_) => f.json("metadata")?,
                None => BTreeMap::new(),
            };
            let media = products::update_product_media(
                state,
                signed_in(actor)?,
                UpdateProductMedia {
                    product_id: f.id("product_id")?,
                    media_mode: f.opt_enum("media_mode", MediaMode::from_i64)?,
                    metadata,
                    files: call.files.clone(),
                },
            )?;
            Ok(Reply::json(json!(media)))
        }
        Endpoint::RemoveProduct => {
            let visibility = products::remove_product(state, signed_in(actor)?, f.id("product_id")?)?;
            Ok(Reply::json(json!({ "visibility": visibility })))
        }
        Endpoint::DeleteProduct => {
            let id = products::delete_product(state, signed_in(actor)?, f.id("product_id")?)?;
            Ok(Reply::json(json!({ "product_id": id })))
        }

        // Stores
        Endpoint::CreateStore => {
            let store = stores::create_store(
                state,
                signed_in(actor)?,
                CreateStore {
                    alias: f.opt_string("alias").unwrap_or_default(),
                    name: f.opt_string("name").unwrap_or_default(),
                    brand_id: f.opt_id("brand_id")?,
                    description: f.opt_string("description"),
                    website: f.opt_string("website"),
                    status: f.opt_enum("status", StoreStatus::from_i64)?,
                    address: address(f)?,
                    tags: f.opt_tags()?.unwrap_or_default(),
                },
            )?;
            Ok(Reply::json(json!({ "store": store })))
        }
        Endpoint::GetStore => {
            let target = EntityRef::from_parts(f.opt_id("store_id")?, f.opt_string("alias"), "store_id")?;
            Ok(Reply::json(json!({ "store": stores::get_store(state, &target)? })))
        }
        Endpoint::GetStores => {
            let query = StoreQuery::from_parts(
                f.opt_string("query"),
                f.opt_f64("latitude")?,
                f.opt_f64("longitude")?,
                f.page()?,
            )?;
            Ok(Reply::json(json!({ "stores": stores::get_stores(state, &query)? })))
        }
        Endpoint::UpdateStore => {
            let store = stores::update_store(
                state,
                signed_in(actor)?,
                UpdateStore {
                    store_id: f.id("store_id")?,
                    name: f.opt_string("name").unwrap_or_default(),
                    brand_id: f.opt_id("brand_id")?,
                    description: f.opt_string("description"),
                    website: f.opt_string("website"),
                    status: f.opt_enum("status", StoreStatus::from_i64)?,
                    address: address(f)?,
                    tags: f.opt_tags()?.unwrap_or_default(),
                },
            )?;
            Ok(Reply::json(json!({ "store": store })))
        }
        Endpoint::RemoveStore => {
            let visibility = stores::remove_store(state, signed_in(actor)?, f.id("store_id")?)?;
            Ok(Reply::json(json!({ "visibility": visibility })))
        }
        Endpoint::DeleteStore => {
            let id = stores::delete_store(state, signed_in(actor)?, f.id("store_id")?)?;
            Ok(Reply::json(json!({ "store_id": id })))
        }

        // Store products
        Endpoint::CreateStoreProduct => {
            let sp = store_products::create_store_product(
                state,
                signed_in(actor)?,
                CreateStoreProduct {
                    store_id: f.id("store_id")?,
                    product_id: f.id("product_id")?,
                    fields: listing_fields(f)?,
                },
            )?;
            Ok(Reply::json(json!({ "store_product": sp })))
        }
        Endpoint::GetStoreProduct => {
            let sp = store_products::get_store_product(state, f.id("store_product_id")?)?;
            Ok(Reply::json(json!({ "store_product": sp })))
        }
        Endpoint::GetStoreProducts => {
            let sps = store_products::get_store_products(state, f.id("store_id")?, f.page()?)?;
            Ok(Reply::json(json!({ "store_products": sps })))
        }
        Endpoint::UpdateStoreProduct => {
            let sp = store_products::update_store_product(
                state,
                signed_in(actor)?,
                UpdateStoreProduct {
                    store_product_id: f.id("store_product_id")?,
                    fields: listing_fields(f)?,
                },
            )?;
            Ok(Reply::json(json!({ "store_product": sp })))
        }
        Endpoint::DeleteStoreProduct => {
            let id = store_products::delete_store_product(state, signed_in(actor)?, f.id("store_product_id")?)?;
            Ok(Reply::json(json!({ "store_product_id": id })))
        }

        // Reports
        Endpoint::ReportBrand => {
            let report = reports::report_brand(state, signed_in(actor)?, new_report(f, "brand_id")?)?;
            Ok(Reply::json(json!({ "report": report })))
        }
        Endpoint::ReportProduct => {
            let report = reports::report_product(state, signed_in(actor)?, new_report(f, "product_id")?)?;
            Ok(Reply::json(json!({ "report": report })))
        }
        Endpoint::ReportStore => {
            let report = reports::report_store(state, signed_in(actor)?, new_report(f, "store_id")?)?;
            Ok(Reply::json(json!({ "report": report })))
        }
        Endpoint::ReportUserAccount => {
            let report =
                reports::report_user_account(state, signed_in(actor)?, new_report(f, "user_account_id")?)?;
            Ok(Reply::json(json!({ "report": report })))
        }

        // Reference data
        Endpoint::GetCountryList => {
            let countries = reference::get_country_list(state, f.opt_bool("is_enabled")?)?;
            Ok(Reply::json(json!({ "countries": countries })))
        }
        Endpoint::GetDialingCodeList => {
            let codes = reference::get_dialing_code_list(state, f.opt_bool("is_enabled")?)?;
            Ok(Reply::json(json!({ "dialing_codes": codes })))
        }
        Endpoint::GetLocalities => {
            let localities = reference::get_localities(state, f.opt_str("query").unwrap_or_default())?;
            Ok(Reply::json(json!({ "localities": localities })))
        }
        Endpoint::GetProductColorList => {
            Ok(Reply::json(json!({ "product_colors": reference::get_product_color_list(state)? })))
        }
        Endpoint::GetProductMaterialList => Ok(Reply::json(
            json!({ "product_materials": reference::get_product_material_list(state)? }),
        )),

        Endpoint::DeleteBrandAvatar
        | Endpoint::DeleteStoreAvatar
        | Endpoint::DeleteUserAvatar
        | Endpoint::GetBadge
        | Endpoint::UpdateStoreAvatar
        | Endpoint::UpdateUserAccount
        | Endpoint::UpdateUserAvatar => Err(CatalogError::NotImplemented),
    }
}

fn signed_in(actor: Option<&Actor>) -> Result<&Actor, CatalogError> {
    actor.ok_or_else(|| {
        CatalogError::unauthorized(ResponseStatus::SessionInvalid, "A valid session is required.")
    })
}

fn session_reply(call: &Call<'_>, grant: SessionGrant) -> Reply {
    let cookie = session_cookie(&grant.session_id, call.state.config.secure_cookies);
    Reply::json(json!({ "user_account": grant.user_account })).with_header("Set-Cookie", cookie)
}

fn required_file<'f>(
    files: &'f BTreeMap<String, UploadedFile>,
    name: &str,
) -> Result<&'f UploadedFile, CatalogError> {
    files
        .get(name)
        .ok_or_else(|| CatalogError::bad_param(name, "must be an uploaded image file."))
}

fn product_fields(f: &Form<'_>) -> Result<ProductFields, CatalogError> {
    Ok(ProductFields {
        name: f.opt_string("name").unwrap_or_default(),
        parent_product_id: f.opt_id("parent_product_id")?,
        description: f.opt_string("description"),
        display_name_override: f.opt_bool("display_name_override")?.unwrap_or(false),
        main_color_code: f.opt_string("main_color_code"),
        material_id: f.opt_id("material_id")?,
        preorder_timestamp: f.opt_string("preorder_timestamp"),
        release_timestamp: f.opt_string("release_timestamp"),
        status: f.opt_enum("status", ProductStatus::from_i64)?,
        upc: f.opt_string("upc"),
        url: f.opt_string("url"),
    })
}

fn address(f: &Form<'_>) -> Result<AddressInput, CatalogError> {
    Ok(AddressInput {
        building: f.opt_string("building"),
        floor: f.opt_string("floor"),
        unit: f.opt_string("unit"),
        street: f.opt_string("street"),
        post_code: f.opt_string("post_code"),
        latitude: f.f64("latitude")?,
        longitude: f.f64("longitude")?,
        alpha_2_code: f.opt_string("alpha_2_code").unwrap_or_default(),
        locality: f.opt_string("locality").unwrap_or_default(),
    })
}

fn listing_fields(f: &Form<'_>) -> Result<ListingFields, CatalogError> {
    Ok(ListingFields {
        price: f.opt_string("price").unwrap_or_default(),
        condition: f.opt_string("condition"),
        description: f.opt_string("description"),
        status: f.opt_enum("status", StoreProductStatus::from_i64)?,
        url: f.opt_string("url"),
    })
}

fn new_report(f: &Form<'_>, target: &str) -> Result<NewReport, CatalogError> {
    Ok(NewReport {
        target_id: f.id(target)?,
        report_type: f.int("report_type")?,
        comment: f.opt_string("comment"),
    })
}
