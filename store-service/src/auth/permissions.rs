//! Static capability catalogue.
//!
//! Document-backed roles reference these codes through the `permissions`
//! collection; users that predate those documents resolve them through
//! [`crate::auth::roles`].

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PermissionCode {
    // User management
    ViewUsers,
    CreateUser,
    UpdateUser,
    DeleteUser,
    ManageRoles,
    AssignRoles,

    // Products
    ViewProducts,
    CreateProduct,
    EditProduct,
    DeleteProduct,
    ManageProductImages,
    ManageProductInventory,
    ManageProductPricing,

    // Categories
    ViewCategories,
    CreateCategory,
    EditCategory,
    DeleteCategory,

    // Discounts
    ViewDiscounts,
    CreateDiscount,
    EditDiscount,
    DeleteDiscount,
    ManageDiscounts,

    // Orders
    ViewOrders,
    UpdateOrderStatus,
    ProcessRefunds,
    ViewOrderAnalytics,

    // Content
    ViewContent,
    CreateContent,
    UpdateContent,
    DeleteContent,
    ManageMedia,

    // Settings
    ViewSettings,
    UpdateSettings,
    ManagePaymentMethods,
    ManageShippingMethods,

    // Analytics
    ViewAnalytics,
    ExportReports,
    ViewCustomerData,

    // Marketing
    ManageEmailCampaigns,
    ManagePromotions,
}

impl PermissionCode {
    pub const ALL: [PermissionCode; 40] = [
        PermissionCode::ViewUsers,
        PermissionCode::CreateUser,
        PermissionCode::UpdateUser,
        PermissionCode::DeleteUser,
        PermissionCode::ManageRoles,
        PermissionCode::AssignRoles,
        PermissionCode::ViewProducts,
        PermissionCode::CreateProduct,
        PermissionCode::EditProduct,
        PermissionCode::DeleteProduct,
        PermissionCode::ManageProductImages,
        PermissionCode::ManageProductInventory,
        PermissionCode::ManageProductPricing,
        PermissionCode::ViewCategories,
        PermissionCode::CreateCategory,
        PermissionCode::EditCategory,
        PermissionCode::DeleteCategory,
        PermissionCode::ViewDiscounts,
        PermissionCode::CreateDiscount,
        PermissionCode::EditDiscount,
        PermissionCode::DeleteDiscount,
        PermissionCode::ManageDiscounts,
        PermissionCode::ViewOrders,
        PermissionCode::UpdateOrderStatus,
        PermissionCode::ProcessRefunds,
        PermissionCode::ViewOrderAnalytics,
        PermissionCode::ViewContent,
        PermissionCode::CreateContent,
        PermissionCode::UpdateContent,
        PermissionCode::DeleteContent,
        PermissionCode::ManageMedia,
        PermissionCode::ViewSettings,
        PermissionCode::UpdateSettings,
        PermissionCode::ManagePaymentMethods,
        PermissionCode::ManageShippingMethods,
        PermissionCode::ViewAnalytics,
        PermissionCode::ExportReports,
        PermissionCode::ViewCustomerData,
        PermissionCode::ManageEmailCampaigns,
        PermissionCode::ManagePromotions,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            PermissionCode::ViewUsers => "view:users",
            PermissionCode::CreateUser => "create:user",
            PermissionCode::UpdateUser => "update:user",
            PermissionCode::DeleteUser => "delete:user",
            PermissionCode::ManageRoles => "manage:roles",
            PermissionCode::AssignRoles => "assign:roles",
            PermissionCode::ViewProducts => "view:products",
            PermissionCode::CreateProduct => "create:product",
            PermissionCode::EditProduct => "edit:product",
            PermissionCode::DeleteProduct => "delete:product",
            PermissionCode::ManageProductImages => "manage:product_images",
            PermissionCode::ManageProductInventory => "manage:product_inventory",
            PermissionCode::ManageProductPricing => "manage:product_pricing",
            PermissionCode::ViewCategories => "view:categories",
            PermissionCode::CreateCategory => "create:category",
            PermissionCode::EditCategory => "edit:category",
            PermissionCode::DeleteCategory => "delete:category",
            PermissionCode::ViewDiscounts => "view:discounts",
            PermissionCode::CreateDiscount => "create:discount",
            PermissionCode::EditDiscount => "edit:discount",
            PermissionCode::DeleteDiscount => "delete:discount",
            PermissionCode::ManageDiscounts => "update:discount",
            PermissionCode::ViewOrders => "view:orders",
            PermissionCode::UpdateOrderStatus => "update:order_status",
            PermissionCode::ProcessRefunds => "process:refunds",
            PermissionCode::ViewOrderAnalytics => "view:order_analytics",
            PermissionCode::ViewContent => "view:content",
            PermissionCode::CreateContent => "create:content",
            PermissionCode::UpdateContent => "update:content",
            PermissionCode::DeleteContent => "delete:content",
            PermissionCode::ManageMedia => "manage:media",
            PermissionCode::ViewSettings => "view:settings",
            PermissionCode::UpdateSettings => "update:settings",
            PermissionCode::ManagePaymentMethods => "manage:payment_methods",
            PermissionCode::ManageShippingMethods => "manage:shipping_methods",
            PermissionCode::ViewAnalytics => "view:analytics",
            PermissionCode::ExportReports => "export:reports",
            PermissionCode::ViewCustomerData => "view:customer_data",
            PermissionCode::ManageEmailCampaigns => "manage:email_campaigns",
            PermissionCode::ManagePromotions => "manage:promotions",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.code() == code)
    }

    /// `view:products` -> `View Products`
    pub fn display_name(&self) -> String {
        self.code()
            .split([':', '_'])
            .map(capitalize)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// `view:order_analytics` -> `Permission to view order analytics`
    pub fn description(&self) -> String {
        let (verb, object) = self.code().split_once(':').unwrap_or((self.code(), ""));
        format!("Permission to {} {}", verb, object.replace('_', " "))
    }
}

impl fmt::Display for PermissionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
