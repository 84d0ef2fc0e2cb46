use anpost_common::ReturnsError;
use serde::{Deserialize, Serialize};

pub const LABEL_RESPONSE_TYPE: &str = "Label";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sender {
    pub first_name: String,
    pub last_name: String,
    pub contact_number: String,
    pub email_address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SenderAddress {
    pub address_line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_line2: Option<String>,
    pub city: String,
    pub eircode: String,
    pub county: String,
    pub country: String,
    /// ISO 3166-1 alpha-2
    pub countrycode: String,
}

/// Required for returns from EU countries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityDeclarationItem {
    pub item_description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomsContentItem {
    pub list_order: u32,
    pub number_of_units: u32,
    pub description: String,
    pub hs_tarriff: String,
    pub value_amount: f64,
    pub weight: f64,
    pub country_of_origin: String,
}

/// Required for returns from outside the EU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomsInformation {
    pub customs_region_code: String,
    pub customs_category_id: u32,
    /// Kilograms
    pub weight: f64,
    pub value_amount: f64,
    pub postage_fee_paid: f64,
    pub insured_value: f64,
    #[serde(default)]
    pub customs_content_items: Vec<CustomsContentItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnLabelRequest {
    #[serde(default = "_default_response_type")]
    pub output_response_type: String,
    pub sender: Sender,
    pub sender_address: SenderAddress,
    pub retailer_account_no: String,
    pub retailer_return_reason: String,
    pub retailer_order_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub international_security_declaration_items: Option<Vec<SecurityDeclarationItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customs_information: Option<CustomsInformation>,
}

fn _default_response_type() -> String {
    LABEL_RESPONSE_TYPE.to_owned()
}

impl ReturnLabelRequest {
    /// Rejects requests the API would bounce for missing mandatory fields.
    pub fn validate(&self) -> Result<(), ReturnsError> {
        let required = [
            ("output_response_type", &self.output_response_type),
            ("sender.first_name", &self.sender.first_name),
            ("sender.last_name", &self.sender.last_name),
            ("sender_address.address_line1", &self.sender_address.address_line1),
            ("sender_address.city", &self.sender_address.city),
            ("sender_address.countrycode", &self.sender_address.countrycode),
            ("retailer_account_no", &self.retailer_account_no),
            ("retailer_order_number", &self.retailer_order_number),
        ];
        let missing: Vec<_> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(ReturnsError::Validation(format!(
                "missing required fields: {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }
}

/// An entry of the `errors` array, which the API sends either as plain
/// strings or as `{ "message": ... }` objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApiMessage {
    Text(String),
    Detailed { message: String },
}

impl ApiMessage {
    pub fn message(&self) -> &str {
        match self {
            Self::Text(message) => message,
            Self::Detailed { message } => message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnLabelResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub tracking_number: Option<String>,
    /// Base64 encoded PDF when `output_response_type` is `Label`.
    #[serde(default)]
    pub label_data: Option<String>,
    #[serde(default)]
    pub pos_label_printing_barcode: Option<String>,
    #[serde(default)]
    pub transaction_reference: Option<String>,
    #[serde(default)]
    pub collection_date: Option<String>,
    #[serde(default)]
    pub errors: Vec<ApiMessage>,
}
