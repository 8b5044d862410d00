//! The [`Pdu`] enum and the framing around payloads.

use bytes::{BufMut, Bytes, BytesMut};
use zerocopy::IntoBytes;

use crate::{
    DecodeError, EncodeError, MAX_PAYLOAD_SIZE, PduHeader, PduType,
    codec::{PayloadReader, Wire},
    payloads::{
        Ack, Command, Configure, DoStep, ErrorAck, InputOutput, LogAck, LogNotification, Nack,
        Parameters, QueryLog, Register, Run, SetLogging, SetParameter, SetScope, SetSteps,
        SetTimeResolution, StateAck, StateChanged, StepFinished,
    },
};

/// A decoded protocol data unit.
#[derive(Debug, Clone, PartialEq)]
pub enum Pdu {
    /// `STC_register`
    Register(Register),
    /// `STC_deregister`
    Deregister(Command),
    /// `STC_prepare`
    Prepare(Command),
    /// `STC_configure`
    Configure(Configure),
    /// `STC_initialize`
    Initialize(Command),
    /// `STC_run`
    Run(Run),
    /// `STC_do_step`
    DoStep(DoStep),
    /// `STC_send_outputs`
    SendOutputs(Command),
    /// `STC_stop`
    Stop(Command),
    /// `STC_reset`
    Reset(Command),
    /// `CFG_set_time_res`
    SetTimeResolution(SetTimeResolution),
    /// `CFG_set_steps`
    SetSteps(SetSteps),
    /// `CFG_config_clear`
    ClearConfiguration(Command),
    /// `CFG_set_parameter`
    SetParameter(SetParameter),
    /// `CFG_set_logging`
    SetLogging(SetLogging),
    /// `CFG_set_scope`
    SetScope(SetScope),
    /// `INF_state`
    QueryState(Command),
    /// `INF_error`
    QueryError(Command),
    /// `INF_log`
    QueryLog(QueryLog),
    /// `RSP_ack`
    Ack(Ack),
    /// `RSP_nack`
    Nack(Nack),
    /// `RSP_state_ack`
    StateAck(StateAck),
    /// `RSP_error_ack`
    ErrorAck(ErrorAck),
    /// `RSP_log_ack`
    LogAck(LogAck),
    /// `NTF_state_changed`
    StateChanged(StateChanged),
    /// `NTF_log`
    Log(LogNotification),
    /// `NTF_step_finished`
    StepFinished(StepFinished),
    /// `DAT_input_output`
    InputOutput(InputOutput),
    /// `DAT_parameter`
    Parameter(Parameters),
}

impl Pdu {
    /// Type tag of this PDU.
    pub fn pdu_type(&self) -> PduType {
        match self {
            Self::Register(_) => PduType::Register,
            Self::Deregister(_) => PduType::Deregister,
            Self::Prepare(_) => PduType::Prepare,
            Self::Configure(_) => PduType::Configure,
            Self::Initialize(_) => PduType::Initialize,
            Self::Run(_) => PduType::Run,
            Self::DoStep(_) => PduType::DoStep,
            Self::SendOutputs(_) => PduType::SendOutputs,
            Self::Stop(_) => PduType::Stop,
            Self::Reset(_) => PduType::Reset,
            Self::SetTimeResolution(_) => PduType::SetTimeResolution,
            Self::SetSteps(_) => PduType::SetSteps,
            Self::ClearConfiguration(_) => PduType::ClearConfiguration,
            Self::SetParameter(_) => PduType::SetParameter,
            Self::SetLogging(_) => PduType::SetLogging,
            Self::SetScope(_) => PduType::SetScope,
            Self::QueryState(_) => PduType::QueryState,
            Self::QueryError(_) => PduType::QueryError,
            Self::QueryLog(_) => PduType::QueryLog,
            Self::Ack(_) => PduType::Ack,
            Self::Nack(_) => PduType::Nack,
            Self::StateAck(_) => PduType::StateAck,
            Self::ErrorAck(_) => PduType::ErrorAck,
            Self::LogAck(_) => PduType::LogAck,
            Self::StateChanged(_) => PduType::StateChanged,
            Self::Log(_) => PduType::Log,
            Self::StepFinished(_) => PduType::StepFinished,
            Self::InputOutput(_) => PduType::InputOutput,
            Self::Parameter(_) => PduType::Parameter,
        }
    }

    /// Receiver and sequence number of a master command.
    ///
    /// Returns `None` for responses, notifications and data.
    pub fn command_address(&self) -> Option<Command> {
        let (receiver, seq) = match self {
            Self::Register(p) => (p.receiver, p.seq),
            Self::Configure(p) => (p.receiver, p.seq),
            Self::Run(p) => (p.receiver, p.seq),
            Self::DoStep(p) => (p.receiver, p.seq),
            Self::SetTimeResolution(p) => (p.receiver, p.seq),
            Self::SetSteps(p) => (p.receiver, p.seq),
            Self::SetParameter(p) => (p.receiver, p.seq),
            Self::SetLogging(p) => (p.receiver, p.seq),
            Self::SetScope(p) => (p.receiver, p.seq),
            Self::QueryLog(p) => (p.receiver, p.seq),
            Self::Deregister(c)
            | Self::Prepare(c)
            | Self::Initialize(c)
            | Self::SendOutputs(c)
            | Self::Stop(c)
            | Self::Reset(c)
            | Self::ClearConfiguration(c)
            | Self::QueryState(c)
            | Self::QueryError(c) => (c.receiver, c.seq),
            _ => return None,
        };
        Some(Command { receiver, seq })
    }

    /// Sender and outbound sequence number of a slave response or
    /// notification.
    pub fn slave_origin(&self) -> Option<(u8, u32)> {
        match self {
            Self::Ack(p) => Some((p.sender, p.seq)),
            Self::Nack(p) => Some((p.sender, p.seq)),
            Self::StateAck(p) => Some((p.sender, p.seq)),
            Self::ErrorAck(p) => Some((p.sender, p.seq)),
            Self::LogAck(p) => Some((p.sender, p.seq)),
            Self::StateChanged(p) => Some((p.sender, p.seq)),
            Self::Log(p) => Some((p.sender, p.seq)),
            Self::StepFinished(p) => Some((p.sender, p.seq)),
            _ => None,
        }
    }

    /// Append the encoded PDU to `buf`.
    ///
    /// On error `buf` is left as it was.
    pub fn encode(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        let start = buf.len();
        buf.put_bytes(0, PduHeader::SIZE);

        if let Err(e) = self.write_payload(buf) {
            buf.truncate(start);
            return Err(e);
        }

        let size = buf.len() - start - PduHeader::SIZE;
        let length = match u32::try_from(size) {
            Ok(length) if size <= MAX_PAYLOAD_SIZE => length,
            _ => {
                buf.truncate(start);
                return Err(EncodeError::PayloadTooLarge { size, max: MAX_PAYLOAD_SIZE });
            },
        };

        let header = PduHeader::new(self.pdu_type().to_u8(), length);
        buf[start..start + PduHeader::SIZE].copy_from_slice(header.as_bytes());
        Ok(())
    }

    /// Encode into a fresh buffer.
    pub fn to_bytes(&self) -> Result<Bytes, EncodeError> {
        let mut buf = BytesMut::with_capacity(64);
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Decode exactly one PDU from `bytes`.
    ///
    /// The buffer must hold the header and precisely the declared payload.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let (header, payload) = PduHeader::parse(bytes)?;

        let declared = header.length() as usize;
        if declared > MAX_PAYLOAD_SIZE {
            return Err(DecodeError::PayloadTooLarge { size: declared, max: MAX_PAYLOAD_SIZE });
        }
        if declared != payload.len() {
            return Err(DecodeError::LengthMismatch { declared, actual: payload.len() });
        }

        let pdu_type =
            PduType::from_u8(header.type_id()).ok_or(DecodeError::Unsupported(header.type_id()))?;
        if let Some(expected) = pdu_type.fixed_payload_len()
            && expected != declared
        {
            return Err(DecodeError::InvalidLength { pdu_type, expected, actual: declared });
        }

        let mut reader = PayloadReader::new(payload);
        let pdu = Self::read_payload(pdu_type, &mut reader)?;
        reader.finish()?;
        Ok(pdu)
    }

    fn write_payload(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        match self {
            Self::Register(p) => p.write(buf),
            Self::Configure(p) => p.write(buf),
            Self::Run(p) => p.write(buf),
            Self::DoStep(p) => p.write(buf),
            Self::SetTimeResolution(p) => p.write(buf),
            Self::SetSteps(p) => p.write(buf),
            Self::SetParameter(p) => p.write(buf),
            Self::SetLogging(p) => p.write(buf),
            Self::SetScope(p) => p.write(buf),
            Self::QueryLog(p) => p.write(buf),
            Self::Deregister(c)
            | Self::Prepare(c)
            | Self::Initialize(c)
            | Self::SendOutputs(c)
            | Self::Stop(c)
            | Self::Reset(c)
            | Self::ClearConfiguration(c)
            | Self::QueryState(c)
            | Self::QueryError(c) => c.write(buf),
            Self::Ack(p) => p.write(buf),
            Self::Nack(p) => p.write(buf),
            Self::StateAck(p) => p.write(buf),
            Self::ErrorAck(p) => p.write(buf),
            Self::LogAck(p) => p.write(buf),
            Self::StateChanged(p) => p.write(buf),
            Self::Log(p) => p.write(buf),
            Self::StepFinished(p) => p.write(buf),
            Self::InputOutput(p) => p.write(buf),
            Self::Parameter(p) => p.write(buf),
        }
    }

    fn read_payload(pdu_type: PduType, r: &mut PayloadReader<'_>) -> Result<Self, DecodeError> {
        Ok(match pdu_type {
            PduType::Register => Self::Register(Register::read(r)?),
            PduType::Deregister => Self::Deregister(Command::read(r)?),
            PduType::Prepare => Self::Prepare(Command::read(r)?),
            PduType::Configure => Self::Configure(Configure::read(r)?),
            PduType::Initialize => Self::Initialize(Command::read(r)?),
            PduType::Run => Self::Run(Run::read(r)?),
            PduType::DoStep => Self::DoStep(DoStep::read(r)?),
            PduType::SendOutputs => Self::SendOutputs(Command::read(r)?),
            PduType::Stop => Self::Stop(Command::read(r)?),
            PduType::Reset => Self::Reset(Command::read(r)?),
            PduType::SetTimeResolution => Self::SetTimeResolution(SetTimeResolution::read(r)?),
            PduType::SetSteps => Self::SetSteps(SetSteps::read(r)?),
            PduType::ClearConfiguration => Self::ClearConfiguration(Command::read(r)?),
            PduType::SetParameter => Self::SetParameter(SetParameter::read(r)?),
            PduType::SetLogging => Self::SetLogging(SetLogging::read(r)?),
            PduType::SetScope => Self::SetScope(SetScope::read(r)?),
            PduType::QueryState => Self::QueryState(Command::read(r)?),
            PduType::QueryError => Self::QueryError(Command::read(r)?),
            PduType::QueryLog => Self::QueryLog(QueryLog::read(r)?),
            PduType::Ack => Self::Ack(Ack::read(r)?),
            PduType::Nack => Self::Nack(Nack::read(r)?),
            PduType::StateAck => Self::StateAck(StateAck::read(r)?),
            PduType::ErrorAck => Self::ErrorAck(ErrorAck::read(r)?),
            PduType::LogAck => Self::LogAck(LogAck::read(r)?),
            PduType::StateChanged => Self::StateChanged(StateChanged::read(r)?),
            PduType::Log => Self::Log(LogNotification::read(r)?),
            PduType::StepFinished => Self::StepFinished(StepFinished::read(r)?),
            PduType::InputOutput => Self::InputOutput(InputOutput::read(r)?),
            PduType::Parameter => Self::Parameter(Parameters::read(r)?),
        })
    }
}
