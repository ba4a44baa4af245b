//! Typed view over what the vision model hands back, and over invoices
//! re-opened for editing. Both feed the same normalization step.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::models::Invoice;
use crate::utils::parse_decimal;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractedParty {
    #[serde(deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(alias = "taxId", deserialize_with = "lenient_string")]
    pub rif: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractedItem {
    #[serde(deserialize_with = "lenient_string")]
    pub description: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub quantity: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub unit_price: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub total: Option<f64>,
}

/// Best-effort invoice fields as returned by the extraction service.
///
/// Every field is optional and tolerant of the usual model slips: numbers
/// sent as strings, `null` arrays, nested objects replaced by `null`.
/// Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractedInvoice {
    #[serde(deserialize_with = "lenient_party")]
    pub client: Option<ExtractedParty>,
    #[serde(deserialize_with = "lenient_party")]
    pub supplier: Option<ExtractedParty>,
    #[serde(deserialize_with = "lenient_string")]
    pub supplier_name: Option<String>,
    #[serde(alias = "supplierRif", deserialize_with = "lenient_string")]
    pub supplier_tax_id: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub invoice_number: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub control_serial: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub date: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub currency: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub subtotal: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub tax: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub total: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub exchange_rate: Option<f64>,
    #[serde(deserialize_with = "lenient_items")]
    pub items: Vec<ExtractedItem>,
}

impl ExtractedInvoice {
    /// Fails only when the payload is not a JSON object at all.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

/// The two shapes a review can start from.
#[derive(Debug, Clone, PartialEq)]
pub enum RawExtraction {
    AiExtraction(ExtractedInvoice),
    ExistingInvoiceEdit(Invoice),
}

impl RawExtraction {
    pub fn existing_id(&self) -> Option<&str> {
        match self {
            RawExtraction::AiExtraction(_) => None,
            RawExtraction::ExistingInvoiceEdit(invoice) => Some(invoice.id.as_str()),
        }
    }

    pub fn existing_invoice(&self) -> Option<&Invoice> {
        match self {
            RawExtraction::AiExtraction(_) => None,
            RawExtraction::ExistingInvoiceEdit(invoice) => Some(invoice),
        }
    }

    /// Receiving party named by the model. Re-edits never carry one.
    pub fn client(&self) -> Option<&ExtractedParty> {
        match self {
            RawExtraction::AiExtraction(data) => data.client.as_ref(),
            RawExtraction::ExistingInvoiceEdit(_) => None,
        }
    }

    pub fn client_tax_id(&self) -> Option<&str> {
        self.client().and_then(|c| present(c.rif.as_deref()))
    }

    pub fn supplier_name(&self) -> Option<&str> {
        match self {
            RawExtraction::AiExtraction(data) => present(data.supplier_name.as_deref())
                .or_else(|| data.supplier.as_ref().and_then(|s| present(s.name.as_deref()))),
            RawExtraction::ExistingInvoiceEdit(invoice) => present(Some(invoice.supplier_name.as_str())),
        }
    }

    pub fn supplier_tax_id(&self) -> Option<&str> {
        match self {
            RawExtraction::AiExtraction(data) => present(data.supplier_tax_id.as_deref())
                .or_else(|| data.supplier.as_ref().and_then(|s| present(s.rif.as_deref()))),
            RawExtraction::ExistingInvoiceEdit(invoice) => present(Some(invoice.supplier_tax_id.as_str())),
        }
    }

    pub fn invoice_number(&self) -> Option<&str> {
        match self {
            RawExtraction::AiExtraction(data) => present(data.invoice_number.as_deref()),
            RawExtraction::ExistingInvoiceEdit(invoice) => present(Some(invoice.invoice_number.as_str())),
        }
    }

    pub fn control_serial(&self) -> Option<&str> {
        match self {
            RawExtraction::AiExtraction(data) => present(data.control_serial.as_deref()),
            RawExtraction::ExistingInvoiceEdit(invoice) => present(Some(invoice.control_serial.as_str())),
        }
    }

    pub fn date(&self) -> Option<&str> {
        match self {
            RawExtraction::AiExtraction(data) => present(data.date.as_deref()),
            RawExtraction::ExistingInvoiceEdit(invoice) => present(Some(invoice.date.as_str())),
        }
    }

    pub fn currency(&self) -> Option<&str> {
        match self {
            RawExtraction::AiExtraction(data) => present(data.currency.as_deref()),
            RawExtraction::ExistingInvoiceEdit(invoice) => present(Some(invoice.currency.as_str())),
        }
    }

    pub fn subtotal(&self) -> Option<f64> {
        match self {
            RawExtraction::AiExtraction(data) => nonzero(data.subtotal),
            RawExtraction::ExistingInvoiceEdit(invoice) => nonzero(Some(invoice.subtotal)),
        }
    }

    pub fn tax(&self) -> Option<f64> {
        match self {
            RawExtraction::AiExtraction(data) => nonzero(data.tax),
            RawExtraction::ExistingInvoiceEdit(invoice) => nonzero(Some(invoice.tax)),
        }
    }

    pub fn total(&self) -> Option<f64> {
        match self {
            RawExtraction::AiExtraction(data) => nonzero(data.total),
            RawExtraction::ExistingInvoiceEdit(invoice) => nonzero(Some(invoice.total)),
        }
    }

    pub fn exchange_rate(&self) -> Option<f64> {
        match self {
            RawExtraction::AiExtraction(data) => nonzero(data.exchange_rate),
            RawExtraction::ExistingInvoiceEdit(invoice) => nonzero(Some(invoice.exchange_rate)),
        }
    }

    pub fn company_id(&self) -> Option<i64> {
        match self {
            RawExtraction::AiExtraction(_) => None,
            RawExtraction::ExistingInvoiceEdit(invoice) => Some(invoice.company_id).filter(|id| *id != 0),
        }
    }

    pub fn category_id(&self) -> Option<i64> {
        match self {
            RawExtraction::AiExtraction(_) => None,
            RawExtraction::ExistingInvoiceEdit(invoice) => Some(invoice.category_id).filter(|id| *id != 0),
        }
    }
}

// Empty strings and zero amounts count as absent, so defaults apply to them too.
fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn nonzero(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v != 0.0 && v.is_finite())
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => parse_decimal(&s).ok(),
        _ => None,
    })
}

fn lenient_party<'de, D>(deserializer: D) -> Result<Option<ExtractedParty>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(v @ Value::Object(_)) => serde_json::from_value(v).ok(),
        _ => None,
    })
}

fn lenient_items<'de, D>(deserializer: D) -> Result<Vec<ExtractedItem>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}
