//! Route table for `/api/v1/<name>`.

macro_rules! endpoints {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// One variant per API route.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Endpoint {
            $($variant),+
        }

        impl Endpoint {
            pub const ALL: &'static [Endpoint] = &[$(Endpoint::$variant),+];

            /// Route name as it appears after `/api/v1/`.
            pub fn name(self) -> &'static str {
                match self {
                    $(Endpoint::$variant => $name),+
                }
            }

            /// Accepts a bare name or a full `/api/v1/<name>` path.
            pub fn from_path(path: &str) -> Option<Self> {
                let name = path
                    .trim()
                    .trim_start_matches("/api/v1/")
                    .trim_matches('/');
                match name {
                    $($name => Some(Endpoint::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

endpoints! {
    CheckAlias => "check-alias",
    CheckBrandAlias => "check-brand-alias",
    CheckVerificationCode => "check-verification-code",
    CreateBrand => "create-brand",
    CreateProduct => "create-product",
    CreateStore => "create-store",
    CreateStoreProduct => "create-store-product",
    DeleteBrand => "delete-brand",
    DeleteBrandAvatar => "delete-brand-avatar",
    DeleteProduct => "delete-product",
    DeleteStore => "delete-store",
    DeleteStoreAvatar => "delete-store-avatar",
    DeleteStoreProduct => "delete-store-product",
    DeleteUserAccount => "delete-user-account",
    DeleteUserAvatar => "delete-user-avatar",
    GetBadge => "get-badge",
    GetBrand => "get-brand",
    GetBrands => "get-brands",
    GetCountryList => "get-country-list",
    GetDialingCodeList => "get-dialing-code-list",
    GetLocalities => "get-localities",
    GetProduct => "get-product",
    GetProductColorList => "get-product-color-list",
    GetProductMaterialList => "get-product-material-list",
    GetProductVariants => "get-product-variants",
    GetProducts => "get-products",
    GetStore => "get-store",
    GetStoreProduct => "get-store-product",
    GetStoreProducts => "get-store-products",
    GetStores => "get-stores",
    GetUserAccount => "get-user-account",
    GetUserAccounts => "get-user-accounts",
    Heartbeat => "heartbeat",
    Join => "join",
    LogIn => "log-in",
    LogOut => "log-out",
    Me => "me",
    RemoveBrand => "remove-brand",
    RemoveProduct => "remove-product",
    RemoveStore => "remove-store",
    ReportBrand => "report-brand",
    ReportProduct => "report-product",
    ReportStore => "report-store",
    ReportUserAccount => "report-user-account",
    SendVerificationCode => "send-verification-code",
    UpdateBrand => "update-brand",
    UpdateBrandAvatar => "update-brand-avatar",
    UpdateProduct => "update-product",
    UpdateProductMedia => "update-product-media",
    UpdateStore => "update-store",
    UpdateStoreAvatar => "update-store-avatar",
    UpdateStoreProduct => "update-store-product",
    UpdateUserAccount => "update-user-account",
    UpdateUserAvatar => "update-user-avatar",
}

impl Endpoint {
    /// Routes that exist but are not built yet.
    pub fn is_stub(self) -> bool {
        matches!(
            self,
            Endpoint::DeleteBrandAvatar
                | Endpoint::DeleteStoreAvatar
                | Endpoint::DeleteUserAvatar
                | Endpoint::GetBadge
                | Endpoint::UpdateStoreAvatar
                | Endpoint::UpdateUserAccount
                | Endpoint::UpdateUserAvatar
        )
    }

    /// Routes callable without a session: sign-up/sign-in steps and
    /// catalog reads.
    pub fn is_public(self) -> bool {
        matches!(
            self,
            Endpoint::CheckAlias
                | Endpoint::CheckBrandAlias
                | Endpoint::CheckVerificationCode
                | Endpoint::SendVerificationCode
                | Endpoint::Join
                | Endpoint::LogIn
                | Endpoint::GetBrand
                | Endpoint::GetBrands
                | Endpoint::GetCountryList
                | Endpoint::GetDialingCodeList
                | Endpoint::GetLocalities
                | Endpoint::GetProduct
                | Endpoint::GetProductColorList
                | Endpoint::GetProductMaterialList
                | Endpoint::GetProductVariants
                | Endpoint::GetProducts
                | Endpoint::GetStore
                | Endpoint::GetStoreProduct
                | Endpoint::GetStoreProducts
                | Endpoint::GetStores
                | Endpoint::GetUserAccount
                | Endpoint::GetUserAccounts
        )
    }
}
