use lazy_static::lazy_static;

use crate::db::models::NewDisease;
use crate::db::{RepositoryError, SqliteRepository};

fn entry(
    name: &str,
    local_name: &str,
    description: &str,
    symptoms: &[&str],
    organic_treatments: &[&str],
    chemical_treatments: &[&str],
    prevention: &[&str],
) -> NewDisease {
    let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    NewDisease {
        name: name.to_string(),
        local_name: local_name.to_string(),
        description: description.to_string(),
        symptoms: owned(symptoms),
        organic_treatments: owned(organic_treatments),
        chemical_treatments: owned(chemical_treatments),
        prevention: owned(prevention),
    }
}

const ROUTINE_CARE: [&str; 3] = [
    "Lanjutkan perawatan rutin",
    "Jaga kebersihan lahan",
    "Pemupukan berimbang",
];

lazy_static! {
    /// Built-in advice for the nine model classes, in model index order.
    /// Also the seed data for the persisted catalog.
    pub static ref STATIC_DISEASES: Vec<NewDisease> = vec![
        entry(
            "Anthracnose",
            "Antraknosa",
            "Penyakit jamur yang menyebabkan bercak hitam cekung pada buah cabai.",
            &[
                "Bercak hitam atau coklat pada buah",
                "Bercak meluas dan cekung",
                "Buah mengkerut dan busuk",
            ],
            &[
                "Semprotkan larutan bawang putih (500g bawang putih + 1L air)",
                "Gunakan ekstrak daun pepaya",
                "Aplikasikan Trichoderma sp.",
            ],
            &[
                "Fungisida berbahan aktif Mankozeb",
                "Fungisida berbahan aktif Propineb",
                "Semprotkan setiap 7-10 hari saat musim hujan",
            ],
            &[
                "Gunakan benih yang bebas penyakit",
                "Rotasi tanaman minimal 2 tahun",
                "Hindari kelembaban berlebih",
            ],
        ),
        entry(
            "Damping Off",
            "Rebah Kecambah",
            "Penyakit yang menyerang bibit muda menyebabkan rebah dan mati.",
            &[
                "Batang bibit mengecil di pangkal",
                "Bibit rebah dan layu",
                "Akar membusuk",
            ],
            &[
                "Taburkan abu sekam pada media semai",
                "Aplikasikan Trichoderma harzianum",
                "Gunakan kompos yang sudah matang",
            ],
            &[
                "Fungisida berbahan aktif Metalaksil",
                "Rendam benih dengan fungisida sebelum tanam",
            ],
            &[
                "Sterilisasi media semai",
                "Atur jarak tanam yang baik",
                "Hindari penyiraman berlebihan",
            ],
        ),
        entry(
            "Healthy Fruit",
            "Buah Sehat",
            "Buah cabai dalam kondisi sehat tanpa gejala penyakit.",
            &[],
            &[],
            &[],
            &ROUTINE_CARE,
        ),
        entry(
            "Healthy Leaf",
            "Daun Sehat",
            "Daun cabai dalam kondisi sehat tanpa gejala penyakit.",
            &[],
            &[],
            &[],
            &ROUTINE_CARE,
        ),
        entry(
            "Leaf Curl",
            "Keriting Daun",
            "Penyakit virus yang menyebabkan daun menggulung dan keriting.",
            &[
                "Daun menggulung ke atas",
                "Daun menebal dan kaku",
                "Pertumbuhan terhambat",
                "Tanaman kerdil",
            ],
            &[
                "Cabut dan musnahkan tanaman terinfeksi",
                "Semprotkan pestisida nabati untuk kutu pembawa virus",
                "Pasang perangkap kuning",
            ],
            &[
                "Insektisida untuk mengendalikan kutu daun",
                "Tidak ada obat untuk virus, fokus pada pencegahan",
            ],
            &[
                "Gunakan varietas tahan virus",
                "Pasang mulsa plastik perak",
                "Kendalikan gulma",
            ],
        ),
        entry(
            "Leaf Spot",
            "Bercak Daun",
            "Penyakit jamur yang menyebabkan bercak pada daun.",
            &[
                "Bercak coklat atau hitam pada daun",
                "Bercak meluas dan berlubang",
                "Daun menguning dan rontok",
            ],
            &[
                "Semprotkan larutan air kapur",
                "Aplikasikan fungisida hayati",
                "Pangkas daun terinfeksi",
            ],
            &[
                "Fungisida berbahan aktif Klorotalonil",
                "Fungisida berbahan aktif Tembaga hidroksida",
            ],
            &[
                "Hindari penyiraman dari atas",
                "Jaga sirkulasi udara",
                "Rotasi tanaman",
            ],
        ),
        entry(
            "Veinal Mottle",
            "Belang Urat Daun",
            "Penyakit virus yang menyebabkan belang pada urat daun.",
            &[
                "Pola belang kuning sepanjang urat daun",
                "Daun mengerut",
                "Buah kecil dan cacat",
            ],
            &[
                "Musnahkan tanaman terinfeksi",
                "Kendalikan kutu daun secara alami",
                "Tanam tanaman pengusir serangga",
            ],
            &["Insektisida untuk kutu daun pembawa virus"],
            &[
                "Gunakan benih bebas virus",
                "Pasang barrier tanaman",
                "Sanitasi lahan secara rutin",
            ],
        ),
        entry(
            "Whitefly",
            "Kutu Kebul",
            "Serangan hama kutu kebul yang mengisap cairan tanaman.",
            &[
                "Kutu putih kecil di bawah daun",
                "Daun menguning",
                "Terdapat embun jelaga",
                "Tanaman layu",
            ],
            &[
                "Semprotkan minyak neem",
                "Gunakan sabun insektisida",
                "Pasang perangkap kuning berperekat",
            ],
            &[
                "Insektisida berbahan aktif Imidakloprid",
                "Insektisida berbahan aktif Abamektin",
            ],
            &[
                "Pasang mulsa plastik perak",
                "Tanam refugia untuk predator alami",
                "Rotasi insektisida untuk mencegah resistensi",
            ],
        ),
        entry(
            "Yellowish",
            "Menguning",
            "Kondisi daun menguning yang bisa disebabkan berbagai faktor.",
            &[
                "Daun berubah kuning",
                "Daun layu",
                "Pertumbuhan lambat",
            ],
            &[
                "Tambahkan pupuk organik kaya nitrogen",
                "Perbaiki drainase tanah",
                "Cek pH tanah dan sesuaikan",
            ],
            &[
                "Pupuk daun NPK",
                "Pupuk mengandung zat besi jika defisiensi Fe",
            ],
            &[
                "Pemupukan berimbang",
                "Pengairan yang tepat",
                "Drainase yang baik",
            ],
        ),
    ];
}

pub fn find_static(name: &str) -> Option<&'static NewDisease> {
    STATIC_DISEASES.iter().find(|d| d.name == name)
}

/// Upserts the built-in table into the catalog. Returns `(created, updated)`.
pub fn seed_catalog(repo: &SqliteRepository) -> Result<(usize, usize), RepositoryError> {
    let mut created = 0;
    let mut updated = 0;
    for disease in STATIC_DISEASES.iter() {
        let (record, is_new) = repo.upsert_disease(disease)?;
        if is_new {
            log::info!("Added disease {} ({})", record.name, record.local_name);
            created += 1;
        } else {
            log::info!("Updated disease {}", record.name);
            updated += 1;
        }
    }
    Ok((created, updated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_CLASSES;

    #[test]
    fn table_covers_every_model_class_in_order() {
        let names: Vec<&str> = STATIC_DISEASES.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, DEFAULT_CLASSES.to_vec());
    }

    #[test]
    fn healthy_classes_have_no_treatments() {
        let leaf = find_static("Healthy Leaf").unwrap();
        assert!(leaf.symptoms.is_empty());
        assert!(leaf.organic_treatments.is_empty());
        assert_eq!(leaf.prevention.len(), 3);
    }

    #[test]
    fn seeding_twice_updates_instead_of_duplicating() {
        let repo = SqliteRepository::new(crate::db::open_memory_database().unwrap());
        assert_eq!(seed_catalog(&repo).unwrap(), (9, 0));
        assert_eq!(seed_catalog(&repo).unwrap(), (0, 9));
        assert_eq!(repo.count_diseases().unwrap(), 9);
    }

    #[test]
    fn lookup_is_exact() {
        assert!(find_static("leaf spot").is_none());
        assert_eq!(find_static("Leaf Spot").unwrap().local_name, "Bercak Daun");
    }
}
