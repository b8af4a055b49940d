//! Host/network byte order helpers

/// Host to network order, 16-bit
#[inline]
pub const fn htons(v: u16) -> u16 {
    v.to_be()
}

/// Network to host order, 16-bit
#[inline]
pub const fn ntohs(v: u16) -> u16 {
    u16::from_be(v)
}

/// Host to network order, 32-bit
#[inline]
pub const fn htonl(v: u32) -> u32 {
    v.to_be()
}

/// Network to host order, 32-bit
#[inline]
pub const fn ntohl(v: u32) -> u32 {
    u32::from_be(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_order_bytes() {
        assert_eq!(htons(0x1234).to_ne_bytes(), [0x12, 0x34]);
        assert_eq!(htonl(0x0a00_0005).to_ne_bytes(), [10, 0, 0, 5]);
    }

    #[test]
    fn test_inverse() {
        assert_eq!(ntohs(htons(8080)), 8080);
        assert_eq!(ntohl(htonl(0xdead_beef)), 0xdead_beef);
    }
}
