//! Fallback records served when the backend cannot be reached.

use crate::models::{Page, UgrozenoLice};

pub const DEFAULT_PAGE_SIZE: usize = 20;

#[allow(clippy::too_many_arguments)]
fn record(
    id: u64,
    ime: &str,
    prezime: &str,
    jmbg: &str,
    ptt: &str,
    grad: &str,
    ulica: &str,
    osnov: &str,
) -> UgrozenoLice {
    UgrozenoLice {
        ugrozeno_lice_id: id,
        redni_broj: format!("UL-{id:04}"),
        ime: ime.to_string(),
        prezime: prezime.to_string(),
        jmbg: jmbg.to_string(),
        ptt_broj: ptt.to_string(),
        grad_opstina: grad.to_string(),
        mesto: grad.to_string(),
        ulica_i_broj: ulica.to_string(),
        osnov_sticanja_statusa: osnov.to_string(),
    }
}

pub fn mock_records() -> Vec<UgrozenoLice> {
    vec![
        record(1, "Marko", "Petrović", "0101985710001", "11000", "Beograd", "Kneza Miloša 12", "RSP"),
        record(2, "Jelena", "Jovanović", "1503990715002", "21000", "Novi Sad", "Bulevar oslobođenja 44", "DD"),
        record(3, "Nikola", "Nikolić", "2207978730003", "18000", "Niš", "Obrenovićeva 7", "UDTNP"),
        record(4, "Milica", "Ilić", "0311962745004", "34000", "Kragujevac", "Kralja Petra I 19", "RSP"),
        record(5, "Stefan", "Đorđević", "1912001710005", "11000", "Beograd", "Cara Dušana 3", "DD"),
    ]
}

pub fn mock_record(id: u64) -> Option<UgrozenoLice> {
    mock_records().into_iter().find(|r| r.ugrozeno_lice_id == id)
}

/// Zero-based page of the mock records.
pub fn mock_page(page: usize, size: usize) -> Page<UgrozenoLice> {
    let all = mock_records();
    let size = if size == 0 { DEFAULT_PAGE_SIZE } else { size };
    let total_elements = all.len();

    let content = all
        .into_iter()
        .skip(page.saturating_mul(size))
        .take(size)
        .collect();

    Page {
        content,
        total_elements,
        total_pages: total_elements.div_ceil(size),
        number: page,
        size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_slice_records() {
        let first = mock_page(0, 2);
        assert_eq!(first.content.len(), 2);
        assert_eq!(first.total_elements, 5);
        assert_eq!(first.total_pages, 3);

        let last = mock_page(2, 2);
        assert_eq!(last.content.len(), 1);
        assert_eq!(last.content[0].ugrozeno_lice_id, 5);

        assert!(mock_page(9, 2).content.is_empty());
    }

    #[test]
    fn zero_size_uses_default() {
        let page = mock_page(0, 0);
        assert_eq!(page.size, DEFAULT_PAGE_SIZE);
        assert_eq!(page.content.len(), 5);
    }

    #[test]
    fn lookup_by_id() {
        assert_eq!(mock_record(3).map(|r| r.prezime), Some("Nikolić".to_string()));
        assert!(mock_record(42).is_none());
    }
}
