//! メモリアクセス機能

use crate::Result;

/// 読み取り対象のアドレス空間
///
/// ページテーブルのエントリは物理アドレスで、モジュール名などのカーネル変数は
/// 仮想アドレスで読み取ります。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressSpace {
    /// 現在のページテーブルを通した仮想アドレス
    Virtual,
    /// エミュレータの物理メモリ
    Physical,
}

/// ターゲットメモリの読み取り能力
///
/// デバッガのバックエンドが実装します。ページテーブルウォーカーはこの
/// トレイトだけに依存します。
pub trait MemoryReader {
    /// メモリからデータを読み取る
    fn read(&mut self, space: AddressSpace, addr: u64, size: usize) -> Result<Vec<u8>>;

    /// u64値を読み取る（リトルエンディアン）
    fn read_u64(&mut self, space: AddressSpace, addr: u64) -> Result<u64> {
        let bytes = self.read(space, addr, 8)?;
        let array: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
            anyhow::anyhow!("Failed to convert {} bytes to u64 array (expected 8 bytes)", bytes.len())
        })?;
        Ok(u64::from_le_bytes(array))
    }

    /// u16値を読み取る（リトルエンディアン）
    fn read_u16(&mut self, space: AddressSpace, addr: u64) -> Result<u16> {
        let bytes = self.read(space, addr, 2)?;
        let array: [u8; 2] = bytes.as_slice().try_into().map_err(|_| {
            anyhow::anyhow!("Failed to convert {} bytes to u16 array (expected 2 bytes)", bytes.len())
        })?;
        Ok(u16::from_le_bytes(array))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Flat(Vec<u8>);

    impl MemoryReader for Flat {
        fn read(&mut self, _space: AddressSpace, addr: u64, size: usize) -> Result<Vec<u8>> {
            let start = addr as usize;
            self.0
                .get(start..start + size)
                .map(|s| s.to_vec())
                .ok_or_else(|| anyhow::anyhow!("out of range"))
        }
    }

    /// 要求より短いデータを返す読み取り
    struct Truncated;

    impl MemoryReader for Truncated {
        fn read(&mut self, _space: AddressSpace, _addr: u64, size: usize) -> Result<Vec<u8>> {
            Ok(vec![0; size / 2])
        }
    }

    #[test]
    fn test_reads_are_little_endian() {
        let mut mem = Flat(vec![0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]);
        assert_eq!(mem.read_u64(AddressSpace::Physical, 0).unwrap(), 0x0807060504030201);
        assert_eq!(mem.read_u16(AddressSpace::Physical, 2).unwrap(), 0x0403);
        assert_eq!(mem.read_u16(AddressSpace::Virtual, 6).unwrap(), 0x0807);
        assert!(mem.read_u64(AddressSpace::Virtual, 4).is_err());
    }

    #[test]
    fn test_short_read_is_error() {
        assert!(Truncated.read_u64(AddressSpace::Physical, 0).is_err());
        assert!(Truncated.read_u16(AddressSpace::Virtual, 0).is_err());
    }
}
