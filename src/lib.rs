pub mod automation;
pub mod bus;
pub mod clock;
pub mod config;
pub mod cpu;
pub mod display;
pub mod error;
pub mod hex;
pub mod io;
pub mod keypad;
pub mod machine;
pub mod memory;
pub mod port;
pub mod printer;
pub mod sound;
pub mod tape;
pub mod utils;
pub mod wav;

use std::{cell::RefCell, collections::VecDeque, rc::Rc};

pub use bus::Bus;
pub use config::MachineConfig;
pub use cpu::{CpuCore, CpuState, Interrupt, Z80Io};
pub use machine::{Machine, Message, RunOutcome};
pub use port::{DigitSelect, Port};
pub use utils::{decimal_to_hex, hexdump};

use display::{DisplaySlot, SegmentSink, Segments};
use js_sys::Function;
use printer::PrintSink;
use sound::{Beep, ToneSink};
use time::OffsetDateTime;
use wasm_bindgen::prelude::*;

struct JsToneSink(Function);

impl ToneSink for JsToneSink {
    fn beep(&mut self, beep: Beep) {
        let result = self.0.call3(
            &JsValue::NULL,
            &JsValue::from(beep.frequency),
            &JsValue::from(beep.duration_ms),
            &JsValue::from(beep.volume),
        );
        if let Err(err) = result {
            tracing::warn!("[SOUND] beep callback failed: {:?}", err);
        }
    }
}

struct JsSegmentSink(Function);

impl SegmentSink for JsSegmentSink {
    fn update(&mut self, slot: DisplaySlot, segments: Segments) {
        let result = self.0.call2(
            &JsValue::NULL,
            &JsValue::from(slot.element_id()),
            &JsValue::from(segments.bits()),
        );
        if let Err(err) = result {
            tracing::warn!("[DISPLAY] segment callback failed: {:?}", err);
        }
    }
}

struct JsPrintSink {
    plot: Function,
    clear: Option<Function>,
}

impl PrintSink for JsPrintSink {
    fn plot(&mut self, x: u32, y: u32) {
        if let Err(err) = self
            .plot
            .call2(&JsValue::NULL, &JsValue::from(x), &JsValue::from(y))
        {
            tracing::warn!("[MTP201] plot callback failed: {:?}", err);
        }
    }

    fn clear(&mut self) {
        if let Some(clear) = &self.clear {
            if let Err(err) = clear.call0(&JsValue::NULL) {
                tracing::warn!("[MTP201] clear callback failed: {:?}", err);
            }
        }
    }
}

/// The peripheral side of the machine for a JavaScript-hosted Z80 core: the
/// core calls `io_read`/`io_write`/`mem_read`/`mem_write` and applies the
/// requests from `drain_requests` between instructions.
#[wasm_bindgen(js_name = Peripherals)]
pub struct JsBus {
    bus: Bus,
    queue: Rc<RefCell<VecDeque<Message>>>,
}

#[wasm_bindgen(js_class = Peripherals)]
impl JsBus {
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<JsBus, JsValue> {
        console_error_panic_hook::set_once();
        let _ = tracing_wasm::try_set_as_global_default();

        let config = match config_json {
            Some(json) => MachineConfig::from_json(&json)
                .map_err(|err| JsValue::from_str(&err.to_string()))?,
            None => MachineConfig::default(),
        };
        let queue = Rc::new(RefCell::new(VecDeque::new()));

        Ok(Self {
            bus: Bus::new(&config, queue.clone()),
            queue,
        })
    }

    pub fn io_read(&mut self, port: u16, t: f64) -> u8 {
        self.bus.input(Port::from(port), t as u64)
    }

    pub fn io_write(&mut self, port: u16, value: u8, t: f64) {
        self.bus.output(Port::from(port), value, t as u64)
    }

    pub fn mem_read(&self, address: u16) -> u8 {
        self.bus.read_byte(address)
    }

    pub fn mem_write(&mut self, address: u16, value: u8) {
        self.bus.write_byte(address, value)
    }

    pub fn load_rom(&mut self, hex: &str, base: u16, protect: bool) -> usize {
        self.bus.memory.load_hex_rom(hex, base, protect)
    }

    pub fn dump(&self, start: u16, end: u16) -> String {
        self.bus.memory.dump(start, end)
    }

    /// Registers the tone routine parameters live in; call before each
    /// instruction that may strobe the speaker.
    pub fn sync_registers(&mut self, c: u8, h: u8, l: u8) {
        self.bus.sync_cpu_state(CpuState {
            c,
            h,
            l,
            ..Default::default()
        });
    }

    pub fn click(&mut self, row: u8, col: u8) {
        self.bus.keypad.record_click(row, col);
    }

    pub fn press(&mut self, label: &str) -> bool {
        self.bus.keypad.press_label(label)
    }

    /// CPU requests queued by the keypad as a JSON array.
    pub fn drain_requests(&mut self) -> String {
        let messages: Vec<Message> = self.queue.borrow_mut().drain(..).collect();
        serde_json::to_string(&messages).unwrap_or_else(|_| "[]".to_string())
    }

    #[wasm_bindgen(getter)]
    pub fn display_text(&self) -> String {
        self.bus.display.as_text()
    }

    pub fn tape_load(&mut self, hex: &str) -> usize {
        self.bus.tape.load_hex(hex)
    }

    pub fn tape_start_recording(&mut self) {
        self.bus.tape.start_recording();
    }

    pub fn tape_stop_recording(&mut self) {
        self.bus.tape.stop_recording();
    }

    pub fn tape_wav(&self) -> Option<Vec<u8>> {
        self.bus.tape.synthesize_wav()
    }

    pub fn tape_wav_name(&self) -> String {
        format!("tape-{}.wav", OffsetDateTime::now_utc().unix_timestamp())
    }

    pub fn hex_to_wav(&self, hex: &str) -> Option<Vec<u8>> {
        tape::hex_to_wav(self.bus.tape.timing(), hex)
    }

    pub fn wav_to_hex(&self, wav: &[u8], start: u16) -> Result<String, JsValue> {
        let bytes = tape::wav_to_bytes(self.bus.tape.timing(), wav)
            .map_err(|err| JsValue::from_str(&err.to_string()))?;
        Ok(hex::encode(&bytes, start))
    }

    pub fn printer_text(&self) -> String {
        self.bus.printer.paper().as_text()
    }

    pub fn on_beep(&mut self, callback: Function) {
        self.bus.speaker.set_sink(Box::new(JsToneSink(callback)));
    }

    pub fn on_segments(&mut self, callback: Function) {
        self.bus
            .display
            .set_sink(Box::new(JsSegmentSink(callback)));
    }

    pub fn on_dot(&mut self, plot: Function, clear: Option<Function>) {
        self.bus
            .printer
            .set_sink(Box::new(JsPrintSink { plot, clear }));
    }

    pub fn reset(&mut self) {
        self.bus.reset();
        self.queue.borrow_mut().clear();
    }
}
