//! 测试辅助：把已解码的系数重新写成渐进式文件或逐分量的多扫描文件。

use super::JpegImage;
use super::bitio::BitWriter;
use super::huffman::{AC_CLASS, DC_CLASS, HuffmanEncoder, category, magnitude_bits, optimal_spec};
use super::marker::{self, ScanSelector, Segment};
use super::scan::{self, ScanComponent, TableSet};
use super::zigzag::ZIGZAG;

enum Token {
    Symbol(u8),
    Bits(u16, u8),
}

/// 一次渐进式扫描：分量下标、频带与逐次逼近位。
struct Pass {
    components: &'static [usize],
    ss: u8,
    se: u8,
    ah: u8,
    al: u8,
}

const fn pass(components: &'static [usize], ss: u8, se: u8, ah: u8, al: u8) -> Pass {
    Pass {
        components,
        ss,
        se,
        ah,
        al,
    }
}

/// 三分量图像的扫描脚本，覆盖频带拆分、DC/AC 逐次逼近和多级 AC 细化。
const SCRIPT: &[Pass] = &[
    pass(&[0, 1, 2], 0, 0, 0, 1),
    pass(&[0], 1, 5, 0, 2),
    pass(&[2], 1, 63, 0, 1),
    pass(&[1], 1, 63, 0, 1),
    pass(&[0], 6, 63, 0, 2),
    pass(&[0], 1, 63, 2, 1),
    pass(&[0, 1, 2], 0, 0, 1, 0),
    pass(&[2], 1, 63, 1, 0),
    pass(&[1], 1, 63, 1, 0),
    pass(&[0], 1, 63, 1, 0),
];

/// 扫描前的段：去掉 DHT、DRI 与 SOS，帧头改为 `sof`。
fn header(image: &JpegImage, sof: u8, out: &mut Vec<u8>) {
    out.extend_from_slice(&[0xFF, marker::SOI]);
    for segment in &image.segments {
        match segment.marker {
            marker::DHT | marker::DRI | marker::SOS => {}
            marker::SOF0 | marker::SOF1 | marker::SOF2 => Segment {
                marker: sof,
                data: segment.data.clone(),
            }
            .write_to(out),
            _ => segment.write_to(out),
        }
    }
}

/// 按 [`SCRIPT`] 写出渐进式 (SOF2) 文件，每个扫描带自己的最优哈夫曼表。
pub fn progressive(image: &JpegImage) -> Vec<u8> {
    let mut out = Vec::new();
    header(image, marker::SOF2, &mut out);

    for pass in SCRIPT {
        let scan: Vec<ScanComponent> = pass
            .components
            .iter()
            .map(|&component| ScanComponent {
                component,
                dc_table: 0,
                ac_table: 0,
            })
            .collect();
        let tokens = pass_tokens(image, &scan, pass);

        let mut freq = [0u32; 256];
        for token in &tokens {
            if let Token::Symbol(symbol) = token {
                freq[usize::from(*symbol)] += 1;
            }
        }
        let class = if pass.ss == 0 { DC_CLASS } else { AC_CLASS };
        let spec = optimal_spec(class, 0, &freq);
        let mut dht = Segment {
            marker: marker::DHT,
            data: Vec::new(),
        };
        spec.write_to(&mut dht.data);
        dht.write_to(&mut out);

        let mut sos = Segment {
            marker: marker::SOS,
            data: vec![scan.len() as u8],
        };
        for sc in &scan {
            sos.data
                .extend_from_slice(&[image.frame.components[sc.component].id, 0x00]);
        }
        sos.data
            .extend_from_slice(&[pass.ss, pass.se, (pass.ah << 4) | pass.al]);
        sos.write_to(&mut out);

        let encoder = HuffmanEncoder::new(&spec);
        let mut w = BitWriter::new();
        for token in tokens {
            match token {
                Token::Symbol(symbol) => {
                    let (code, len) = encoder.code(symbol).unwrap();
                    w.write(code, len);
                }
                Token::Bits(value, n) => w.write(value, n),
            }
        }
        out.extend_from_slice(&w.finish());
    }

    out.extend_from_slice(&[0xFF, marker::EOI]);
    out
}

/// 每个分量单独一个完整频带的顺序扫描，只写出 `components` 中列出的分量。
pub fn component_scans(image: &JpegImage, components: &[usize]) -> Vec<u8> {
    let mut out = Vec::new();
    header(image, marker::SOF0, &mut out);

    for &component in components {
        let scan = [ScanComponent {
            component,
            dc_table: 0,
            ac_table: 0,
        }];
        let counts = scan::count_symbols(&image.frame, &scan, 0, &image.grids).unwrap();
        let mut tables = TableSet::default();
        tables.insert(optimal_spec(DC_CLASS, 0, &counts.dc[0]));
        tables.insert(optimal_spec(AC_CLASS, 0, &counts.ac[0]));

        let mut dht = Segment {
            marker: marker::DHT,
            data: Vec::new(),
        };
        for spec in tables.dc.iter().chain(&tables.ac).flatten() {
            spec.write_to(&mut dht.data);
        }
        dht.write_to(&mut out);
        Segment {
            marker: marker::SOS,
            data: marker::sos_body(&[ScanSelector {
                component_id: image.frame.components[component].id,
                dc_table: 0,
                ac_table: 0,
            }]),
        }
        .write_to(&mut out);
        out.extend(scan::encode(&image.frame, &scan, &tables, 0, &image.grids).unwrap());
    }

    out.extend_from_slice(&[0xFF, marker::EOI]);
    out
}

fn pass_tokens(image: &JpegImage, scan: &[ScanComponent], pass: &Pass) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut eob = EobRun::default();
    let mut predictors = vec![0i32; scan.len()];

    scan::walk_blocks(&image.frame, scan, 0, |b| {
        let block = image.grids[scan[b.slot].component].block(b.bx, b.by);
        match (pass.ss == 0, pass.ah == 0) {
            (true, true) => {
                let value = i32::from(block[0]) >> pass.al;
                let diff = value - predictors[b.slot];
                predictors[b.slot] = value;
                let size = category(diff);
                tokens.push(Token::Symbol(size));
                tokens.push(Token::Bits(magnitude_bits(diff, size), size));
            }
            (true, false) => tokens.push(Token::Bits(((block[0] >> pass.al) & 1) as u16, 1)),
            (false, true) => eob.ac_first(block, pass, &mut tokens),
            (false, false) => eob.ac_refine(block, pass, &mut tokens),
        }
        Ok(())
    })
    .unwrap();

    eob.flush(&mut tokens);
    tokens
}

/// 跨块累计的 EOBn 与其后待写的细化位。
#[derive(Default)]
struct EobRun {
    blocks: u32,
    corrections: Vec<u16>,
}

impl EobRun {
    fn flush(&mut self, tokens: &mut Vec<Token>) {
        if self.blocks == 0 {
            return;
        }
        let size = (31 - self.blocks.leading_zeros()) as u8;
        tokens.push(Token::Symbol(size << 4));
        tokens.push(Token::Bits((self.blocks & ((1 << size) - 1)) as u16, size));
        tokens.extend(self.corrections.drain(..).map(|bit| Token::Bits(bit, 1)));
        self.blocks = 0;
    }

    fn ac_first(&mut self, block: &[i16], pass: &Pass, tokens: &mut Vec<Token>) {
        let mut zeros = 0u8;
        for k in usize::from(pass.ss)..=usize::from(pass.se) {
            let coefficient = i32::from(block[ZIGZAG[k]]);
            let magnitude = coefficient.abs() >> pass.al;
            if magnitude == 0 {
                zeros += 1;
                continue;
            }
            let value = if coefficient < 0 { -magnitude } else { magnitude };

            self.flush(tokens);
            while zeros > 15 {
                tokens.push(Token::Symbol(0xF0));
                zeros -= 16;
            }
            let size = category(value);
            tokens.push(Token::Symbol((zeros << 4) | size));
            tokens.push(Token::Bits(magnitude_bits(value, size), size));
            zeros = 0;
        }
        if zeros > 0 {
            self.blocks += 1;
            if self.blocks == 0x7FFF {
                self.flush(tokens);
            }
        }
    }

    fn ac_refine(&mut self, block: &[i16], pass: &Pass, tokens: &mut Vec<Token>) {
        let (ss, se) = (usize::from(pass.ss), usize::from(pass.se));
        let magnitudes: Vec<i32> = (0..64)
            .map(|k| i32::from(block[ZIGZAG[k]]).abs() >> pass.al)
            .collect();
        let last_new = (ss..=se).rev().find(|&k| magnitudes[k] == 1);

        let mut zeros = 0u8;
        let mut pending: Vec<u16> = Vec::new();
        for k in ss..=se {
            let magnitude = magnitudes[k];
            if magnitude == 0 {
                zeros += 1;
                continue;
            }
            while zeros > 15 && last_new.is_some_and(|last| k <= last) {
                self.flush(tokens);
                tokens.push(Token::Symbol(0xF0));
                zeros -= 16;
                tokens.extend(pending.drain(..).map(|bit| Token::Bits(bit, 1)));
            }
            if magnitude > 1 {
                pending.push((magnitude & 1) as u16);
                continue;
            }
            self.flush(tokens);
            tokens.push(Token::Symbol((zeros << 4) | 1));
            tokens.push(Token::Bits(u16::from(block[ZIGZAG[k]] > 0), 1));
            tokens.extend(pending.drain(..).map(|bit| Token::Bits(bit, 1)));
            zeros = 0;
        }
        if zeros > 0 || !pending.is_empty() {
            self.blocks += 1;
            self.corrections.append(&mut pending);
            if self.blocks == 0x7FFF || self.corrections.len() > 937 {
                self.flush(tokens);
            }
        }
    }
}
