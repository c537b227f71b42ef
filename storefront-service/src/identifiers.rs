use rand::Rng;

const DIGITS: &[u8] = b"0123456789";

fn random_digits(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| DIGITS[rng.gen_range(0..DIGITS.len())] as char)
        .collect()
}

/// Customer-facing order reference, e.g. `HC482913`.
pub fn order_identifier() -> String {
    format!("HC{}", random_digits(6))
}

/// Reference attached to payments that arrive without one, e.g. `INV20394857`.
pub fn transaction_id() -> String {
    format!("INV{}", random_digits(8))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_identifier_fits_column() {
        let id = order_identifier();
        assert_eq!(id.len(), 8);
        assert!(id.starts_with("HC"));
        assert!(id[2..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn transaction_id_shape() {
        let id = transaction_id();
        assert_eq!(id.len(), 11);
        assert!(id.starts_with("INV"));
        assert!(id[3..].chars().all(|c| c.is_ascii_digit()));
    }
}
