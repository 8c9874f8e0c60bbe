//! 해시 함수
//!
//! 링 위치 계산에 사용하는 64비트 해시. 결과는 부호 있는 정수로 취급하며
//! 링은 부호 있는 순서로 정렬됩니다.

use std::fmt;

/// 링 해시 함수
pub trait Hashing: Send + Sync + fmt::Debug {
    /// 바이트열 해시
    fn hash(&self, data: &[u8]) -> i64;

    /// 문자열 해시 (UTF-8 바이트)
    fn hash_str(&self, s: &str) -> i64 {
        self.hash(s.as_bytes())
    }
}

// ============================================================================
// MurmurHash - MurmurHash64A
// ============================================================================

/// 기본 시드
pub const DEFAULT_MURMUR_SEED: u64 = 0x1234_ABCD;

const MURMUR_M: u64 = 0xc6a4_a793_5bd1_e995;
const MURMUR_R: u32 = 47;

/// MurmurHash64A (리틀 엔디언 8바이트 블록)
///
/// 기본 해시 함수. 기존 클라이언트와 같은 키 분포를 얻으려면 기본 시드를
/// 그대로 사용해야 합니다.
#[derive(Debug, Clone, Copy)]
pub struct MurmurHash {
    seed: u64,
}

impl MurmurHash {
    /// 시드 지정
    pub fn with_seed(seed: u64) -> Self {
        Self { seed }
    }

    /// 시드
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl Default for MurmurHash {
    fn default() -> Self {
        Self::with_seed(DEFAULT_MURMUR_SEED)
    }
}

impl Hashing for MurmurHash {
    fn hash(&self, data: &[u8]) -> i64 {
        let mut h = self.seed ^ (data.len() as u64).wrapping_mul(MURMUR_M);

        let mut blocks = data.chunks_exact(8);
        for block in &mut blocks {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(block);
            let mut k = u64::from_le_bytes(buf);
            k = k.wrapping_mul(MURMUR_M);
            k ^= k >> MURMUR_R;
            k = k.wrapping_mul(MURMUR_M);

            h ^= k;
            h = h.wrapping_mul(MURMUR_M);
        }

        let tail = blocks.remainder();
        if !tail.is_empty() {
            // 남은 바이트는 0으로 채운 리틀 엔디언 정수
            let mut buf = [0u8; 8];
            buf[..tail.len()].copy_from_slice(tail);
            h ^= u64::from_le_bytes(buf);
            h = h.wrapping_mul(MURMUR_M);
        }

        h ^= h >> MURMUR_R;
        h = h.wrapping_mul(MURMUR_M);
        h ^= h >> MURMUR_R;

        h as i64
    }
}

// ============================================================================
// Fnv1aHash - FNV-1a 64
// ============================================================================

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a 64비트 해시
#[derive(Debug, Clone, Copy, Default)]
pub struct Fnv1aHash;

impl Hashing for Fnv1aHash {
    fn hash(&self, data: &[u8]) -> i64 {
        data.iter()
            .fold(FNV_OFFSET_BASIS, |h, b| (h ^ u64::from(*b)).wrapping_mul(FNV_PRIME)) as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_murmur_reference_values() {
        let murmur = MurmurHash::default();
        assert_eq!(murmur.hash(b""), 8371356515094919947);
        assert_eq!(murmur.hash(b"a"), 7990182172224381693);
        assert_eq!(murmur.hash(b"foo"), -7063922479176959649);
        assert_eq!(murmur.hash(b"12345678"), 5197521178503088135);
        assert_eq!(murmur.hash_str("hello world"), -7467008419718616472);
        assert_eq!(murmur.hash_str("user:1000"), -6452771463440683135);
    }

    #[test]
    fn test_murmur_seed_changes_output() {
        let a = MurmurHash::default().hash(b"foo");
        let b = MurmurHash::with_seed(42).hash(b"foo");
        assert_ne!(a, b);
        assert_eq!(MurmurHash::default().seed(), DEFAULT_MURMUR_SEED);
    }

    #[test]
    fn test_fnv1a_reference_values() {
        let fnv = Fnv1aHash;
        assert_eq!(fnv.hash(b""), FNV_OFFSET_BASIS as i64);
        assert_eq!(fnv.hash(b"a"), -5808556873153909620);
        assert_eq!(fnv.hash_str("foo"), -2543842089295555209);
    }
}
