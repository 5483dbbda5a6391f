//! 字节数组上的位操作。第 `i` 位在第 `i / 8` 个字节里，字节内从低位数起。

fn locate(index: usize) -> (usize, u8) {
    (index / 8, 1 << (index % 8))
}

/// 检查第 `index` 位是否为 1
pub fn is_set(bytes: &[u8], index: usize) -> bool {
    let (byte, mask) = locate(index);
    bytes[byte] & mask != 0
}

/// 把第 `index` 位置 1
pub fn set(bytes: &mut [u8], index: usize) {
    let (byte, mask) = locate(index);
    bytes[byte] |= mask;
}

/// 把第 `index` 位清 0，返回清除之前它是不是 1
pub fn clear(bytes: &mut [u8], index: usize) -> bool {
    let (byte, mask) = locate(index);
    let was_set = bytes[byte] & mask != 0;
    bytes[byte] &= !mask;
    was_set
}

/// 把字节数组转成 "0"/"1" 字符串，按位号从小到大排列。
/// 每个字节之间用 `sep` 隔开，每 `every` 个字节换成 `line_sep`（`every == 0` 表示不分行）。
pub fn to_bit_string(bytes: &[u8], sep: &str, line_sep: &str, every: usize) -> String {
    let mut s = String::with_capacity(bytes.len() * (8 + sep.len()));
    for (i, _) in bytes.iter().enumerate() {
        if i > 0 {
            if every > 0 && i % every == 0 {
                s.push_str(line_sep);
            } else {
                s.push_str(sep);
            }
        }
        for bit in 0..8 {
            s.push(if is_set(bytes, i * 8 + bit) { '1' } else { '0' });
        }
    }
    s
}
