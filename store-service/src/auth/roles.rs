//! Legacy role bundles, resolved in memory for users without document roles.

use super::permissions::PermissionCode::{self, *};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LegacyRole {
    Admin,
    ProductManager,
    OrderManager,
    ContentManager,
    MarketingManager,
    CustomerService,
    InventoryManager,
    AnalyticsViewer,
    StoreManager,
}

impl LegacyRole {
    pub const ALL: [LegacyRole; 9] = [
        LegacyRole::Admin,
        LegacyRole::ProductManager,
        LegacyRole::OrderManager,
        LegacyRole::ContentManager,
        LegacyRole::MarketingManager,
        LegacyRole::CustomerService,
        LegacyRole::InventoryManager,
        LegacyRole::AnalyticsViewer,
        LegacyRole::StoreManager,
    ];

    /// Key used as the role document name (`PRODUCT_MANAGER`).
    pub fn key(&self) -> &'static str {
        match self {
            LegacyRole::Admin => "ADMIN",
            LegacyRole::ProductManager => "PRODUCT_MANAGER",
            LegacyRole::OrderManager => "ORDER_MANAGER",
            LegacyRole::ContentManager => "CONTENT_MANAGER",
            LegacyRole::MarketingManager => "MARKETING_MANAGER",
            LegacyRole::CustomerService => "CUSTOMER_SERVICE",
            LegacyRole::InventoryManager => "INVENTORY_MANAGER",
            LegacyRole::AnalyticsViewer => "ANALYTICS_VIEWER",
            LegacyRole::StoreManager => "STORE_MANAGER",
        }
    }

    /// Human form stored on older user records (`PRODUCT MANAGER`).
    pub fn readable(&self) -> String {
        self.key().replace('_', " ")
    }

    /// Accepts either the key or the spaced form.
    pub fn parse(name: &str) -> Option<Self> {
        let normalized = name.trim().to_uppercase().replace(' ', "_");
        Self::ALL.iter().copied().find(|r| r.key() == normalized)
    }

    pub fn permissions(&self) -> &'static [PermissionCode] {
        match self {
            LegacyRole::Admin => &PermissionCode::ALL,
            LegacyRole::ProductManager => &[
                ViewProducts,
                CreateProduct,
                EditProduct,
                DeleteProduct,
                ManageProductImages,
                ManageProductInventory,
                ManageProductPricing,
                ViewCategories,
                CreateCategory,
                EditCategory,
                DeleteCategory,
                ViewDiscounts,
                CreateDiscount,
                EditDiscount,
                DeleteDiscount,
            ],
            LegacyRole::OrderManager => &[
                ViewOrders,
                UpdateOrderStatus,
                ProcessRefunds,
                ViewOrderAnalytics,
                ViewCustomerData,
            ],
            LegacyRole::ContentManager => &[
                ViewContent,
                CreateContent,
                UpdateContent,
                DeleteContent,
                ManageMedia,
            ],
            LegacyRole::MarketingManager => &[
                ViewProducts,
                ViewDiscounts,
                CreateDiscount,
                EditDiscount,
                ManageDiscounts,
                ViewAnalytics,
                ManageEmailCampaigns,
                ManagePromotions,
            ],
            LegacyRole::CustomerService => &[
                ViewOrders,
                UpdateOrderStatus,
                ViewCustomerData,
                ViewProducts,
            ],
            LegacyRole::InventoryManager => {
                &[ViewProducts, ManageProductInventory, ViewOrderAnalytics]
            }
            LegacyRole::AnalyticsViewer => &[ViewAnalytics, ExportReports, ViewOrderAnalytics],
            LegacyRole::StoreManager => &[
                ViewProducts,
                EditProduct,
                ManageProductPricing,
                ViewOrders,
                UpdateOrderStatus,
                ViewDiscounts,
                ViewAnalytics,
                ViewCustomerData,
                ViewSettings,
            ],
        }
    }
}

pub fn permissions_for_role(role: LegacyRole) -> &'static [PermissionCode] {
    role.permissions()
}

/// Union of every role's permissions, deduplicated.
pub fn permissions_for_roles(roles: &[LegacyRole]) -> BTreeSet<PermissionCode> {
    roles
        .iter()
        .flat_map(|r| r.permissions().iter().copied())
        .collect()
}

pub fn has_permission(roles: &[LegacyRole], permission: PermissionCode) -> bool {
    roles.iter().any(|r| r.permissions().contains(&permission))
}

pub fn has_all_permissions(roles: &[LegacyRole], permissions: &[PermissionCode]) -> bool {
    let granted = permissions_for_roles(roles);
    permissions.iter().all(|p| granted.contains(p))
}

pub fn has_any_permission(roles: &[LegacyRole], permissions: &[PermissionCode]) -> bool {
    let granted = permissions_for_roles(roles);
    permissions.iter().any(|p| granted.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_holds_everything() {
        for p in PermissionCode::ALL {
            assert!(has_permission(&[LegacyRole::Admin], p));
        }
    }

    #[test]
    fn parse_accepts_spaced_and_keyed_names() {
        assert_eq!(LegacyRole::parse("PRODUCT MANAGER"), Some(LegacyRole::ProductManager));
        assert_eq!(LegacyRole::parse("store_manager"), Some(LegacyRole::StoreManager));
        assert_eq!(LegacyRole::parse("JANITOR"), None);
    }

    #[test]
    fn union_is_deduplicated() {
        let perms = permissions_for_roles(&[LegacyRole::OrderManager, LegacyRole::CustomerService]);
        assert_eq!(perms.len(), 6);
        assert!(perms.contains(&ViewProducts));
        assert!(perms.contains(&ProcessRefunds));
    }

    #[test]
    fn all_and_any_checks() {
        let roles = [LegacyRole::InventoryManager];
        assert!(has_all_permissions(&roles, &[ViewProducts, ManageProductInventory]));
        assert!(!has_all_permissions(&roles, &[ViewProducts, DeleteProduct]));
        assert!(has_any_permission(&roles, &[DeleteProduct, ViewOrderAnalytics]));
        assert!(!has_any_permission(&roles, &[DeleteProduct, ViewSettings]));
    }

    #[test]
    fn marketing_can_manage_discounts_but_product_manager_cannot() {
        assert!(has_permission(&[LegacyRole::MarketingManager], ManageDiscounts));
        assert!(!has_permission(&[LegacyRole::ProductManager], ManageDiscounts));
    }
}
