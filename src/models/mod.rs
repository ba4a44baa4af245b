use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: i64,
    pub tax_id: String,
    pub name: String,
    pub address: String,
    pub currencies: Vec<String>,
    pub tax_id_label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Supplier {
    pub id: i64,
    pub tax_id: String,
    pub name: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseCategory {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceItem {
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub line_total: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Pending,
    Validated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: String,
    pub company_id: i64,
    #[serde(default)]
    pub supplier_id: Option<i64>,
    pub supplier_name: String,
    pub supplier_tax_id: String,
    pub invoice_number: String,
    pub control_serial: String,
    pub date: String,
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
    pub currency: String,
    pub exchange_rate: f64,
    pub total_local: f64,
    pub total_foreign: f64,
    pub status: InvoiceStatus,
    pub prompt_id: i64,
    pub image: String,
    #[serde(default)]
    pub items: Vec<InvoiceItem>,
    pub category_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Editor,
    Loader,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Editor, Role::Loader];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Editor => "Editor",
            Role::Loader => "Loader",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .iter()
            .copied()
            .find(|role| role.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown role: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Screen {
    Dashboard,
    Upload,
    Invoices,
    Companies,
    Suppliers,
    Categories,
    Prompts,
    Users,
    Roles,
    Audit,
    Integrations,
}

impl Screen {
    pub const ALL: [Screen; 11] = [
        Screen::Dashboard,
        Screen::Upload,
        Screen::Invoices,
        Screen::Companies,
        Screen::Suppliers,
        Screen::Categories,
        Screen::Prompts,
        Screen::Users,
        Screen::Roles,
        Screen::Audit,
        Screen::Integrations,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Screen::Dashboard => "dashboard",
            Screen::Upload => "upload",
            Screen::Invoices => "invoices",
            Screen::Companies => "companies",
            Screen::Suppliers => "suppliers",
            Screen::Categories => "categories",
            Screen::Prompts => "prompts",
            Screen::Users => "users",
            Screen::Roles => "roles",
            Screen::Audit => "audit",
            Screen::Integrations => "integrations",
        }
    }
}

impl FromStr for Screen {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Screen::ALL
            .iter()
            .copied()
            .find(|screen| screen.as_str() == s)
            .ok_or_else(|| format!("Unknown screen: {}", s))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RolePermissions {
    pub allowed_screens: BTreeSet<Screen>,
    pub can_edit_invoices: bool,
    pub can_delete_invoices: bool,
    pub can_manage_masters: bool,
    pub can_manage_system: bool,
}

pub type RolePermissionTable = BTreeMap<Role, RolePermissions>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiPrompt {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    CreateInvoice,
    EditInvoice,
    DeleteInvoice,
    RegisterCompany,
    RegisterSupplier,
    SaveMaster,
    DeleteMaster,
    ModifyPermissions,
    UpdatePrompt,
}

impl AuditAction {
    pub fn code(&self) -> &'static str {
        match self {
            AuditAction::CreateInvoice => "CREATE_INVOICE",
            AuditAction::EditInvoice => "EDIT_INVOICE",
            AuditAction::DeleteInvoice => "DELETE_INVOICE",
            AuditAction::RegisterCompany => "REGISTER_COMPANY",
            AuditAction::RegisterSupplier => "REGISTER_SUPPLIER",
            AuditAction::SaveMaster => "SAVE_MASTER",
            AuditAction::DeleteMaster => "DELETE_MASTER",
            AuditAction::ModifyPermissions => "MODIFY_PERMISSIONS",
            AuditAction::UpdatePrompt => "UPDATE_PROMPT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: String,
    pub actor_id: String,
    pub actor_role: Role,
    pub action: AuditAction,
    pub details: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub local_currency: String,
    pub default_exchange_rate: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            gemini_api_key: None,
            gemini_model: "gemini-2.5-pro".to_string(),
            local_currency: "Bs".to_string(),
            default_exchange_rate: 60.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceSummary {
    pub id: String,
    pub date: String,
    pub invoice_number: String,
    pub supplier_name: String,
    pub company_name: String,
    pub category_name: String,
    pub currency: String,
    pub total: f64,
    pub total_local: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedAmount {
    pub name: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_local: f64,
    pub count: usize,
    pub by_currency: Vec<NamedAmount>,
    pub by_category: Vec<NamedAmount>,
    pub by_month: Vec<NamedAmount>,
}
