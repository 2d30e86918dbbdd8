use serde::{Deserialize, Serialize};

/// One entry of the ranked class distribution.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RankedPrediction {
    #[serde(rename = "kelas")]
    pub class_name: String,
    #[serde(rename = "kepercayaan")]
    pub confidence: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PredictionResponse {
    #[serde(rename = "sukses")]
    pub success: bool,
    #[serde(rename = "kelas")]
    pub class_name: String,
    #[serde(rename = "namaIndonesia")]
    pub local_name: String,
    #[serde(rename = "kepercayaan")]
    pub confidence: f64,
    #[serde(rename = "persentaseKepercayaan")]
    pub confidence_percent: f64,
    #[serde(rename = "statusSehat")]
    pub healthy: bool,
    #[serde(rename = "deskripsi")]
    pub description: String,
    #[serde(rename = "gejala")]
    pub symptoms: Vec<String>,
    #[serde(rename = "penangananOrganik")]
    pub organic_treatments: Vec<String>,
    #[serde(rename = "penangananKimia")]
    pub chemical_treatments: Vec<String>,
    #[serde(rename = "pencegahan")]
    pub prevention: Vec<String>,
    #[serde(rename = "semuaPrediksi")]
    pub top_predictions: Vec<RankedPrediction>,
    #[serde(rename = "pesan")]
    pub message: String,
    #[serde(rename = "idRiwayat", skip_serializing_if = "Option::is_none")]
    pub history_id: Option<i64>,
}

/// Envelope used for every failure and for plain acknowledgements.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct MessageResponse {
    #[serde(rename = "sukses")]
    pub success: bool,
    #[serde(rename = "pesan")]
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct HealthResponse {
    pub status: String,
    #[serde(rename = "pesan")]
    pub message: String,
    #[serde(rename = "versi")]
    pub version: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ClassItem {
    #[serde(rename = "kelas")]
    pub class_name: String,
    #[serde(rename = "namaIndonesia")]
    pub local_name: String,
    #[serde(rename = "deskripsi")]
    pub description: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ClassListResponse {
    #[serde(rename = "sukses")]
    pub success: bool,
    #[serde(rename = "jumlahKelas")]
    pub count: usize,
    #[serde(rename = "daftarKelas")]
    pub classes: Vec<ClassItem>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password2: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Partial profile update; absent fields are left untouched.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ProfileUpdateRequest {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub nomor_telepon: Option<String>,
    pub alamat: Option<String>,
}
