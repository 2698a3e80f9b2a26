// LS age is excluded from the LSA checksum.
const LSA_AGE_LEN: usize = 2;

// Offset of the LS checksum field counted from the first checksummed byte.
const LSA_CHECKSUM_POS: usize = 14;

pub fn lsa_checksum_valid(lsa: &[u8]) -> bool {
    if lsa.len() < LSA_AGE_LEN + LSA_CHECKSUM_POS + 2 {
        return false;
    }
    fletcher::calc_fletcher16(&lsa[LSA_AGE_LEN..]) == 0
}

pub fn lsa_checksum_calc(lsa: &[u8]) -> u16 {
    if lsa.len() < LSA_AGE_LEN + LSA_CHECKSUM_POS + 2 {
        return 0;
    }
    let mut data = lsa[LSA_AGE_LEN..].to_vec();
    data[LSA_CHECKSUM_POS] = 0;
    data[LSA_CHECKSUM_POS + 1] = 0;

    let checksum = fletcher::calc_fletcher16(&data);
    let mut c0 = (checksum & 0x00FF) as i32;
    let mut c1 = ((checksum >> 8) & 0x00FF) as i32;

    let sop = data.len() as i32 - (LSA_CHECKSUM_POS as i32 + 1);
    let mut x = (sop * c0 - c1) % 255;
    if x <= 0 {
        x += 255;
    }
    c1 = 510 - c0 - x;
    if c1 > 255 {
        c1 -= 255;
    }
    c0 = x;
    u16::from_be_bytes([c0 as u8, c1 as u8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    const ROUTER_LSA: [u8; 36] = hex!(
        "
        03 e2 02 01 c0 a8 aa 08 c0 a8 aa 08 80 00 0d c3
        25 06 00 24 02 00 00 01 c0 a8 aa 00 ff ff ff 00
        03 00 00 0a
        "
    );

    #[test]
    fn checksum_valid() {
        assert!(lsa_checksum_valid(&ROUTER_LSA));
    }

    #[test]
    fn checksum_calc() {
        assert_eq!(lsa_checksum_calc(&ROUTER_LSA), 0x2506);
    }

    #[test]
    fn checksum_ignores_age() {
        let mut lsa = ROUTER_LSA;
        lsa[0] = 0x0e;
        lsa[1] = 0x10;
        assert!(lsa_checksum_valid(&lsa));
    }

    #[test]
    fn checksum_corrupted() {
        let mut lsa = ROUTER_LSA;
        lsa[17] ^= 0xff;
        assert!(!lsa_checksum_valid(&lsa));
        assert!(!lsa_checksum_valid(&lsa[..10]));
    }
}
