//! 之字形扫描顺序与自然 (行优先) 顺序之间的映射。

/// 第 `k` 个之字形位置对应的自然下标 `row * 8 + col`。
pub const ZIGZAG: [usize; 64] = [
    0, 1, 8, 16, 9, 2, 3, 10, 17, 24, 32, 25, 18, 11, 4, 5, 12, 19, 26, 33, 40, 48, 41, 34, 27,
    20, 13, 6, 7, 14, 21, 28, 35, 42, 49, 56, 57, 50, 43, 36, 29, 22, 15, 23, 30, 37, 44, 51, 58,
    59, 52, 45, 38, 31, 39, 46, 53, 60, 61, 54, 47, 55, 62, 63,
];

/// 把自然顺序的块转换为之字形顺序。
pub fn to_zigzag(natural: &[i16]) -> [i16; 64] {
    let mut zz = [0i16; 64];
    for (k, &n) in ZIGZAG.iter().enumerate() {
        zz[k] = natural[n];
    }
    zz
}
