//! Command handling
//!
//! Every decoded packet goes through [`CommandStateMachine::handle`]. Head
//! unit packets are dispatched on their command; the changer's own echoed
//! replies go through a second dispatch that continues multi-step
//! exchanges. Both dispatches match every [`Command`] explicitly so a new
//! table entry cannot be forgotten.

use mbus_protocol::{Command, Packet, Source};

use super::flags;
use super::status::DeviceStatus;

/// BCD 99, reported for unknown track and time
const BCD_99: u32 = 0x99;

/// What to do after handling a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Response {
    /// Nothing to send
    None,
    /// Send this packet now
    Reply(Packet),
    /// Now-playing status; left to the periodic heartbeat instead of sent now
    Play(Packet),
}

/// Changer behavior
#[derive(Debug, Clone, Default)]
pub struct CommandStateMachine {
    status: DeviceStatus,
    last_radio: Option<Command>,
}

impl CommandStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> &DeviceStatus {
        &self.status
    }

    pub fn status_mut(&mut self) -> &mut DeviceStatus {
        &mut self.status
    }

    /// Last head unit command not yet consumed by an echo sequence
    pub fn last_radio(&self) -> Option<Command> {
        self.last_radio
    }

    /// Handle one decoded packet
    pub fn handle(&mut self, packet: &Packet) -> Response {
        match packet.source {
            Source::Radio => {
                self.last_radio = Some(packet.command);
                self.on_radio(packet)
            }
            Source::Changer => self.on_echo(packet),
            Source::Unknown => Response::None,
        }
    }

    /// Changer-sourced packet with no field data
    fn fresh(command: Command) -> Packet {
        let mut packet = Packet::new(command);
        packet.source = Source::Changer;
        packet
    }

    fn reply_status(&self) -> Response {
        Response::Reply(self.status.packet())
    }

    fn on_radio(&mut self, packet: &Packet) -> Response {
        use Command::*;

        match packet.command {
            Ping => Response::Reply(Self::fresh(PingOk)),

            Play => {
                self.status.command = Playing;
                self.status.set_play_state(flags::PLAY);
                self.reply_status()
            }
            Pause => {
                self.status.command = Paused;
                self.status.set_play_state(flags::PAUSE);
                self.reply_status()
            }
            Stop | ScanStop => {
                self.status.command = Stopped;
                self.status.fields.flags |= flags::STOP;
                self.reply_status()
            }

            PlayFastForward | PauseFastForward => {
                self.status.command = Forwarding;
                self.reply_status()
            }
            PlayFastReverse | PauseFastReverse => {
                self.status.command = Reversing;
                self.reply_status()
            }

            RepeatOff => self.set_mode(flags::REPEAT_OFF),
            RepeatOne => self.set_mode(flags::REPEAT_ONE),
            RepeatAll => self.set_mode(flags::REPEAT_ALL),
            Scan => self.set_mode(flags::SCAN),
            Mix => self.set_mode(flags::MIX),

            Select => self.select(packet),

            Resume | ResumePaused => {
                let mut reply = self.status.to_packet(Changing);
                reply.fields.flags = flags::CHANGE_DONE;
                Response::Reply(reply)
            }

            Status | NextMix | PrevMix => Response::Reply(Self::fresh(Ack)),

            // Not sent by a head unit; answer like any unknown command
            Invalid | PingOk | Ack | Preparing | Stopped | Paused | Playing | Spinup
            | Forwarding | Reversing | PowerUp | LastInfo | Changing4 | Changing
            | NoMagazine | Changing2 | Changing3 | Changing1 | DiskStatus | Status1
            | Status2 => Response::Reply(Self::fresh(Ack)),
        }
    }

    /// Change the repeat/scan/mix mode and confirm with a Preparing status
    fn set_mode(&mut self, mode: u32) -> Response {
        self.status.set_mode(mode);
        Response::Reply(self.status.to_packet(Command::Preparing))
    }

    /// Disk or track change
    ///
    /// Disk digit 0 or the current disk selects a track on the current disk.
    fn select(&mut self, packet: &Packet) -> Response {
        let requested = packet.fields;
        let mut reply = self.status.to_packet(Command::Changing);

        if requested.disk != 0 && requested.disk != self.status.fields.disk {
            self.status.fields.disk = requested.disk;
            self.status.fields.track = 1;
            reply.fields.disk = requested.disk;
            reply.fields.track = 1;
            reply.fields.flags = flags::CHANGE_BUSY;
        } else {
            self.status.fields.track = requested.track;
            reply.fields.track = requested.track;
            reply.fields.flags = flags::CHANGE_DONE;
        }

        self.status.reset_clock();
        reply.fields.minutes = 0;
        reply.fields.seconds = 0;
        Response::Reply(reply)
    }

    fn on_echo(&mut self, packet: &Packet) -> Response {
        use Command::*;

        match packet.command {
            Ack => self.on_ack_echo(),

            Preparing => {
                if self.status.fields.flags & flags::PLAY != 0 {
                    self.status.command = Playing;
                    self.reply_status()
                } else if self.status.fields.flags & flags::PAUSE != 0 {
                    self.status.command = Paused;
                    self.reply_status()
                } else {
                    Response::None
                }
            }
            Stopped => {
                self.status.command = Stopped;
                // Previous play/pause bit is kept
                self.status.fields.flags |= flags::STOP;
                Response::None
            }
            Paused => {
                self.status.command = Paused;
                self.status.set_play_state(flags::PAUSE);
                Response::None
            }
            Playing => {
                self.status.command = Playing;
                self.status.set_play_state(flags::PLAY);
                Response::Play(self.status.packet())
            }

            Spinup | Changing => Response::Reply(Self::fresh(Ack)),

            DiskStatus => {
                let mut reply = self.status.to_packet(Spinup);
                reply.fields.flags = flags::PLAY;
                Response::Reply(reply)
            }

            PingOk | Forwarding | Reversing | PowerUp | LastInfo | Changing4 | NoMagazine
            | Changing2 | Changing3 | Changing1 | Status1 | Status2 => Response::None,

            // Head unit commands never carry the changer source digit
            Invalid | Ping | Play | Pause | Stop | ScanStop | PlayFastForward
            | PlayFastReverse | PauseFastForward | PauseFastReverse | Resume | ResumePaused
            | NextMix | PrevMix | RepeatOff | RepeatOne | RepeatAll | Scan | Mix | Select
            | Status => Response::None,
        }
    }

    /// Our own Ack came back; continue whatever the head unit asked for
    fn on_ack_echo(&mut self) -> Response {
        match self.last_radio.take() {
            Some(Command::Status) => {
                let mut reply = self.status.to_packet(Command::DiskStatus);
                reply.fields.track = BCD_99;
                reply.fields.minutes = BCD_99;
                reply.fields.seconds = BCD_99;
                Response::Reply(reply)
            }
            Some(Command::Resume) => {
                self.status.command = Command::Playing;
                self.status.set_play_state(flags::PLAY);
                self.reply_status()
            }
            Some(Command::ResumePaused) => {
                self.status.command = Command::Paused;
                self.status.set_play_state(flags::PAUSE);
                self.reply_status()
            }
            Some(Command::Select) => {
                // Heartbeat reports the new track from here on
                self.status.command = Command::Playing;
                self.status.set_play_state(flags::PLAY);
                Response::None
            }
            _ => Response::None,
        }
    }
}
