use crate::month::Month;
use crate::records::PatientRecord;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorCount {
    pub sector: String,
    pub count: u32,
}

/// Patients attended in one month, total and per sector
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientMonth {
    pub month: String,
    pub total: u64,
    pub sectors: Vec<SectorCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientStats {
    pub total_patients: u64,
    /// Average over the months in which any sector saw patients
    pub monthly_average: u64,
    pub sectors: usize,
}

/// Sum of all sectors for one month
pub fn total_for_month(patients: &[PatientRecord], month: Month) -> u64 {
    patients.iter().map(|p| p.count(month) as u64).sum()
}

pub fn analyze_patients_by_month(patients: &[PatientRecord]) -> Vec<PatientMonth> {
    Month::ALL
        .iter()
        .map(|&month| PatientMonth {
            month: month.full_name().to_string(),
            total: total_for_month(patients, month),
            sectors: patients
                .iter()
                .map(|p| SectorCount {
                    sector: p.sector.clone(),
                    count: p.count(month),
                })
                .collect(),
        })
        .collect()
}

pub fn patient_stats(patients: &[PatientRecord]) -> PatientStats {
    let total_patients: u64 = patients.iter().map(PatientRecord::total).sum();
    let months_with_data = Month::ALL
        .iter()
        .filter(|&&month| patients.iter().any(|p| p.count(month) > 0))
        .count();

    PatientStats {
        total_patients,
        monthly_average: if months_with_data > 0 {
            (total_patients as f64 / months_with_data as f64).round() as u64
        } else {
            0
        },
        sectors: patients.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sector(name: &str, counts: &[u32]) -> PatientRecord {
        let mut all = [0; 12];
        all[..counts.len()].copy_from_slice(counts);
        PatientRecord {
            sector: name.to_string(),
            counts: all,
        }
    }

    #[test]
    fn monthly_totals_across_sectors() {
        let patients = vec![sector("UTI", &[10, 0, 5]), sector("Pediatria", &[4, 6])];
        let by_month = analyze_patients_by_month(&patients);

        assert_eq!(by_month.len(), 12);
        assert_eq!(by_month[0].month, "Janeiro");
        assert_eq!(by_month[0].total, 14);
        assert_eq!(by_month[1].total, 6);
        assert_eq!(by_month[2].month, "Março");
        assert_eq!(by_month[2].sectors[0].count, 5);
        assert_eq!(by_month[2].sectors[1].count, 0);
        assert_eq!(by_month[11].total, 0);
    }

    #[test]
    fn stats_average_over_populated_months() {
        let patients = vec![sector("UTI", &[10, 0, 5]), sector("Pediatria", &[4, 6])];
        let stats = patient_stats(&patients);
        assert_eq!(stats.total_patients, 25);
        assert_eq!(stats.monthly_average, 8);
        assert_eq!(stats.sectors, 2);

        let empty = patient_stats(&[]);
        assert_eq!(empty.total_patients, 0);
        assert_eq!(empty.monthly_average, 0);
        assert_eq!(empty.sectors, 0);
    }
}
