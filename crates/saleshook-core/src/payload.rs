//! Typed sale-status payload produced by the validation gate.
//!
//! Field names follow the vendor's wire format. Serializing a
//! [`ValidatedPayload`] yields the canonical JSON projection that is stored
//! in both the audit log and the sale event table.

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::Result;

/// A sale-status notification that passed every schema check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatedPayload {
    /// Vendor-side sale identifier.
    #[serde(rename = "id_venda")]
    pub sale_id: i64,
    /// Sale status label, e.g. `processo_finalizado`.
    pub status: String,
    /// When the sale was created on the vendor side.
    #[serde(rename = "data_criacao", serialize_with = "iso8601::serialize")]
    pub created_at: DateTime<FixedOffset>,
    /// When the sale was last updated on the vendor side.
    #[serde(rename = "data_atualizacao", serialize_with = "iso8601::serialize")]
    pub updated_at: DateTime<FixedOffset>,
    /// The real-estate unit being sold.
    #[serde(rename = "dados_empreendimento")]
    pub venture: VentureDescriptor,
    /// The buyer.
    #[serde(rename = "dados_cliente")]
    pub client: ClientDescriptor,
}

/// Development, unit and parking allocation for a sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VentureDescriptor {
    /// Development name.
    #[serde(rename = "nome")]
    pub name: String,
    /// Street address.
    #[serde(rename = "endereco")]
    pub address: String,
    /// Unit number.
    #[serde(rename = "unidade")]
    pub unit: String,
    /// Building block.
    #[serde(rename = "bloco")]
    pub block: String,
    /// Parking-slot identifiers.
    #[serde(rename = "vagas")]
    pub parking_slots: Vec<String>,
}

/// Buyer details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientDescriptor {
    /// Full name, at least two characters.
    #[serde(rename = "nome")]
    pub name: String,
    /// Sex as sent by the vendor.
    #[serde(rename = "sexo")]
    pub sex: String,
    /// Date of birth.
    #[serde(rename = "data_de_nascimento")]
    pub birth_date: NaiveDate,
    /// Email with the domain lower-cased.
    pub email: String,
    /// Phone number, free form.
    #[serde(rename = "telefone")]
    pub phone: String,
    /// Marital status label.
    #[serde(rename = "estado_civil")]
    pub marital_status: String,
    /// Serialized as `null` when absent.
    #[serde(rename = "conjuge")]
    pub spouse: Option<SpouseDescriptor>,
}

/// Buyer's spouse; the client shape without marital status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpouseDescriptor {
    /// Full name, at least two characters.
    #[serde(rename = "nome")]
    pub name: String,
    /// Sex as sent by the vendor.
    #[serde(rename = "sexo")]
    pub sex: String,
    /// Date of birth.
    #[serde(rename = "data_de_nascimento")]
    pub birth_date: NaiveDate,
    /// Email with the domain lower-cased.
    pub email: String,
    /// Phone number, free form.
    #[serde(rename = "telefone")]
    pub phone: String,
}

impl ValidatedPayload {
    /// Returns the canonical JSON projection of this payload.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::CorruptRow` if serialization fails, which only
    /// happens for timestamps outside the representable range.
    pub fn canonical_json(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// A complete, valid request body for sale 6010.
///
/// Served by the example endpoint and used as the base for test fixtures.
/// The client email carries a trailing space and upper-case domain, both
/// of which are normalized by validation.
pub fn example_body() -> Value {
    json!({
        "id_venda": 6010,
        "status": "processo_finalizado",
        "data_criacao": "2026-02-03T10:30:00Z",
        "data_atualizacao": "2026-02-03T12:45:00Z",
        "dados_empreendimento": {
            "nome": "UNION 511",
            "endereco": "CRNW 511 - BLOCO A LOTE 01 - NOROESTE",
            "unidade": "1234",
            "bloco": "Bloco B",
            "vagas": ["157R"]
        },
        "dados_cliente": {
            "nome": "HERMINIO DE SOUSA JUNIOR",
            "sexo": "MASCULINO",
            "data_de_nascimento": "1985-08-20",
            "email": "HERMSOU3SA@TESTE.COM ",
            "telefone": "61 9 9999-9999",
            "estado_civil": "CASADO(A)",
            "conjuge": {
                "nome": "MONICA CRISTINA ALTAF JULIEN DE SOUSA",
                "sexo": "FEMININO",
                "data_de_nascimento": "1985-08-20",
                "email": "MCJ3ULIEN@TESTE.COM",
                "telefone": "61 9 9999-9999"
            }
        }
    })
}

pub(crate) mod iso8601 {
    use chrono::{DateTime, FixedOffset, SecondsFormat};
    use serde::Serializer;

    /// Writes RFC 3339 with a `Z` suffix for UTC instants and the numeric
    /// offset otherwise.
    pub(crate) fn serialize<S: Serializer>(
        value: &DateTime<FixedOffset>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn payload() -> ValidatedPayload {
        let utc = FixedOffset::east_opt(0).unwrap();
        ValidatedPayload {
            sale_id: 6010,
            status: "processo_finalizado".to_string(),
            created_at: utc.with_ymd_and_hms(2026, 2, 3, 10, 30, 0).unwrap(),
            updated_at: FixedOffset::west_opt(3 * 3600)
                .unwrap()
                .with_ymd_and_hms(2026, 2, 3, 9, 45, 0)
                .unwrap(),
            venture: VentureDescriptor {
                name: "UNION 511".to_string(),
                address: "CRNW 511".to_string(),
                unit: "1234".to_string(),
                block: "Bloco B".to_string(),
                parking_slots: vec!["157R".to_string()],
            },
            client: ClientDescriptor {
                name: "HERMINIO".to_string(),
                sex: "MASCULINO".to_string(),
                birth_date: NaiveDate::from_ymd_opt(1985, 8, 20).unwrap(),
                email: "hermes@teste.com".to_string(),
                phone: "61 9 9999-9999".to_string(),
                marital_status: "SOLTEIRO(A)".to_string(),
                spouse: None,
            },
        }
    }

    #[test]
    fn canonical_json_uses_wire_names_and_z_suffix() {
        let json = payload().canonical_json().unwrap();

        assert_eq!(json["id_venda"], json!(6010));
        assert_eq!(json["data_criacao"], json!("2026-02-03T10:30:00Z"));
        assert_eq!(json["data_atualizacao"], json!("2026-02-03T09:45:00-03:00"));
        assert_eq!(json["dados_empreendimento"]["vagas"], json!(["157R"]));
        assert_eq!(json["dados_cliente"]["data_de_nascimento"], json!("1985-08-20"));
        assert_eq!(json["dados_cliente"]["conjuge"], Value::Null);
    }

    #[test]
    fn example_body_validates() {
        let payload = crate::validation::validate(&example_body()).unwrap();
        assert_eq!(payload.sale_id, 6010);
        assert_eq!(payload.client.email, "HERMSOU3SA@teste.com");
        assert_eq!(payload.client.spouse.unwrap().email, "MCJ3ULIEN@teste.com");
    }
}
