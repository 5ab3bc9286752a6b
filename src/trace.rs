//! Host-request trace front-end. One request per line, `#` comments,
//! space or comma delimited, decimal or 0x-prefixed hex literals. The
//! trace must end with an `AiM EOC` line; its callback stops the run.

use std::cell::Cell;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::rc::Rc;

use log::info;

use crate::dma::AimDma;
use crate::isa::{self, Field, FIELD_ORDER};
use crate::request::{Opcode, Region, ReqKind, Request};

pub struct TraceFrontend {
    lines: Box<dyn Iterator<Item = String>>,
    delimiter_is_comma: bool,
    line_no: usize,
    host_req_id: i64,
    undelivered: Option<Request>,
    reached_eoc: bool,
    finished: Rc<Cell<bool>>,
}

impl TraceFrontend {
    pub fn from_path(path: &Path, delimiter: &str) -> Self {
        let file = File::open(path)
            .unwrap_or_else(|e| panic!("trace {} cannot be opened: {}", path.display(), e));
        info!(
            "opening trace file {} with delimiter \"{}\"",
            path.display(),
            delimiter
        );
        let reader = BufReader::new(file);
        let lines = reader.lines().map(|line| line.expect("trace read failed"));
        Self::new(Box::new(lines), delimiter)
    }

    /// Front-end over an in-memory trace; used by tests.
    pub fn from_str(trace: &str, delimiter: &str) -> Self {
        let lines: Vec<String> = trace.lines().map(|l| l.to_string()).collect();
        Self::new(Box::new(lines.into_iter()), delimiter)
    }

    fn new(lines: Box<dyn Iterator<Item = String>>, delimiter: &str) -> Self {
        let delimiter_is_comma = match delimiter {
            "," => true,
            " " => false,
            other => panic!("unsupported trace delimiter \"{}\"", other),
        };
        TraceFrontend {
            lines,
            delimiter_is_comma,
            line_no: 0,
            host_req_id: 0,
            undelivered: None,
            reached_eoc: false,
            finished: Rc::new(Cell::new(false)),
        }
    }

    /// True once the EOC host request has called back.
    pub fn finished(&self) -> bool {
        self.finished.get()
    }

    /// Push at most one host request per cycle, retrying on back-pressure.
    pub fn tick(&mut self, dma: &mut AimDma) {
        if self.undelivered.is_none() && !self.reached_eoc {
            self.undelivered = Some(self.next_host_request());
        }
        if let Some(req) = self.undelivered.take() {
            if !dma.send(req.clone()) {
                self.undelivered = Some(req);
            }
        }
    }

    fn next_host_request(&mut self) -> Request {
        assert!(!self.reached_eoc, "asking for host request while EOC reached");
        loop {
            let line = match self.lines.next() {
                Some(line) => line,
                None => panic!("trace: EOF reached while EOC not reached (trace has no EOC host request)"),
            };
            self.line_no += 1;

            let tokens: Vec<&str> = if self.delimiter_is_comma {
                line.split(',').map(|t| t.trim()).filter(|t| !t.is_empty()).collect()
            } else {
                line.split_whitespace().collect()
            };
            if tokens.is_empty() || tokens[0].starts_with('#') {
                continue;
            }
            return self.decode(&line, &tokens);
        }
    }

    fn decode(&mut self, line: &str, tokens: &[&str]) -> Request {
        let kind = isa::parse_kind(tokens[0])
            .unwrap_or_else(|| panic!("trace line {}: unknown type \"{}\"", self.line_no, tokens[0]));

        let mut req = match kind {
            ReqKind::Aim => self.decode_aim(line, tokens),
            _ => self.decode_rw(kind, tokens),
        };
        req.host_req_id = self.host_req_id;
        self.host_req_id += 1;
        req
    }

    fn decode_aim(&mut self, line: &str, tokens: &[&str]) -> Request {
        // The ISR_ prefix may be omitted in traces.
        let mut name = tokens[1].to_string();
        if !name.starts_with("ISR_") {
            name = format!("ISR_{}", name);
        }
        let descriptor = isa::isr_for_name(&name)
            .unwrap_or_else(|| panic!("trace line {}: unknown AiM opcode \"{}\"", self.line_no, name));

        if descriptor.legal_field_count() != tokens.len() - 2 {
            panic!(
                "trace line {}: AiM request {} requires {} fields but {} specified in: {}",
                self.line_no,
                name,
                descriptor.legal_field_count(),
                tokens.len() - 2,
                line
            );
        }

        let mut req = Request::new_aim(descriptor.opcode);
        let mut token_idx = 2;
        for field in FIELD_ORDER {
            if !descriptor.is_field_legal(field) {
                continue;
            }
            let value = self.decode_int(tokens[token_idx]);
            token_idx += 1;
            isa::check_field_value(descriptor, field, value);
            match field {
                Field::Opsize => req.opsize = value,
                Field::GprAddr0 => req.gpr_addr_0 = value,
                Field::GprAddr1 => req.gpr_addr_1 = value,
                Field::ChannelMask => req.channel_mask = value,
                Field::BankIndex => req.bank_index = value,
                Field::RowAddr => req.row_addr = value,
                Field::ColAddr => req.col_addr = value,
                Field::ThreadIndex => req.thread_index = value,
            }
        }

        if descriptor.opcode == Opcode::Eoc {
            self.reached_eoc = true;
            let finished = Rc::clone(&self.finished);
            req.callback = Some(Rc::new(move |_req: &Request| {
                info!("end-of-compute called back");
                finished.set(true);
            }));
        }
        req
    }

    fn decode_rw(&mut self, kind: ReqKind, tokens: &[&str]) -> Request {
        let region = isa::parse_region(tokens[1]).unwrap_or_else(|| {
            panic!("trace line {}: unknown mem_access_region \"{}\"", self.line_no, tokens[1])
        });
        let ok = match region {
            Region::Cfr => tokens.len() == 4,
            Region::Gpr => tokens.len() == 3,
            // MEM takes channel, bank, row, and optionally a flat
            // address used for write-to-read forwarding.
            Region::Mem => tokens.len() == 5 || tokens.len() == 6,
        };
        if !ok {
            panic!(
                "trace line {}: wrong field count for {} {} request ({} fields)",
                self.line_no,
                isa::kind_name(kind),
                isa::region_name(region),
                tokens.len() - 2
            );
        }

        let mut req = Request::new_rw(kind, region);
        match region {
            Region::Cfr => {
                req.addr = self.decode_int(tokens[2]);
                req.data = self.decode_int(tokens[3]);
            }
            Region::Gpr => {
                req.addr = self.decode_int(tokens[2]);
            }
            Region::Mem => {
                req.channel_mask = self.decode_int(tokens[2]);
                req.bank_index = self.decode_int(tokens[3]);
                req.row_addr = self.decode_int(tokens[4]);
                if tokens.len() == 6 {
                    req.addr = self.decode_int(tokens[5]);
                }
            }
        }
        req
    }

    fn decode_int(&self, token: &str) -> i64 {
        let parsed = if let Some(hex) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
            i64::from_str_radix(hex, 16)
        } else {
            token.parse::<i64>()
        };
        parsed.unwrap_or_else(|_| panic!("trace line {}: malformed integer \"{}\"", self.line_no, token))
    }
}
